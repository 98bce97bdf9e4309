use clap::Parser;
use color_eyre::Result;
use engine::config::load_config;
use flux_studio::{Gui, cli::Cli};

pub fn main() -> Result<()> {
    pretty_env_logger::init();
    let cfg = Cli::parse().apply(load_config()?);
    iced::application(move || Gui::new(cfg.clone()), Gui::update, Gui::view).run()?;
    Ok(())
}
