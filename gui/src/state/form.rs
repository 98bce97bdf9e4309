use color_eyre::{Result, eyre::ensure};
use engine::{
    AspectRatio, FormState, ManualEntry, OutputFormat, SafetyTolerance, Status,
};
use iced::{
    Color, Element, Length,
    widget::{
        self, button, column, container, pick_list, progress_bar, radio, row, rule, scrollable,
        slider, space, text, text_editor, text_input, toggler,
    },
};
use strum::IntoEnumIterator;

use crate::{
    Context, TryIntoExt, bold_text, elem_list, italic_text,
    message::{UiMessage, ui_messages::Form as MyMessage},
    state::{Modal, State, StateCommand, cmd},
    top_level_container,
};

const PROMPT_TIPS: &str = indoc::indoc! {"
    Writing effective image descriptions

    1. Be specific and detailed. Describe exactly what you expect, including the subject,
       style, lighting and perspective.
    2. Mention art styles, like \"oil painting\", \"watercolor\", \"digital art\" or
       \"photorealistic\".
    3. Reference artists. Naming one can steer the style (\"in the style of Monet\").
    4. Describe the lighting: \"golden hour\", \"dramatic shadows\", \"soft ambient light\".
    5. Specify camera details such as \"wide angle\", \"portrait\", \"close-up\" or
       \"bird's eye view\".

    Example:
    Photorealistic breakfast for an anti-inflammatory diet: a bowl of oatmeal with chia
    seeds, fresh blueberries, sliced almonds and a drizzle of honey. A spoon next to the
    bowl, clean table, cozy morning light, no labels or text, high resolution food
    photography.
"};

const FOOTER: &str = "All images are generated with FLUX1.1 Pro. Use responsibly and respect \
    the FLUX1.1 Pro terms of use.";

/// Everything on the form except the prompt editor
#[derive(Debug, Clone, Default)]
struct Fields {
    values: FormState,
    manual: ManualEntry,
}

impl Fields {
    /// Applies plain field edits. Returns false for anything else.
    fn set(&mut self, msg: &MyMessage) -> Result<bool> {
        use MyMessage::*;
        let v = &mut self.values;
        match msg {
            KeyIdChanged(s) => self.manual.key_id = s.clone(),
            KeySecretChanged(s) => self.manual.key_secret = s.clone(),
            SafetyCheckerToggled(b) => v.enable_safety_checker = *b,
            SafetyToleranceChanged(level) => {
                v.safety_tolerance = SafetyTolerance::try_new(*level)?
            }
            OutputFormatSelected(f) => v.output_format = *f,
            AspectRatioSelected(a) => v.aspect_ratio = *a,
            RawToggled(b) => v.raw = *b,
            UseSeedToggled(b) => v.use_seed = *b,
            SeedChanged(s) => v.seed = s.clone(),
            PromptEdit(_) | Generate | SaveImage | ShowRawResult | ShowTips => return Ok(false),
        }
        Ok(true)
    }
}

/// Entry for the aspect ratio pick list, shown with its long label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RatioChoice(AspectRatio);

impl std::fmt::Display for RatioChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.label())
    }
}

#[derive(Debug, Clone)]
pub struct Form {
    fields: Fields,
    prompt: text_editor::Content,
}

impl Form {
    pub fn new() -> Self {
        Self {
            fields: Fields::default(),
            prompt: text_editor::Content::default(),
        }
    }

    fn sidebar<'a>(&'a self, ctx: &'a Context) -> Element<'a, UiMessage> {
        let v = &self.fields.values;
        let mut items = Vec::from(elem_list![
            bold_text("Configuration").size(18),
        ]);

        if ctx.needs_manual_credential() {
            items.extend(elem_list![
                text("No configured API key found, please enter both parts of it.")
                    .color(Color::from_rgb(0.8, 0.5, 0.)),
                text("API key id"),
                text_input("Key id", &self.fields.manual.key_id)
                    .secure(true)
                    .on_input(|s| MyMessage::KeyIdChanged(s).into()),
                text("API key secret"),
                text_input("Key secret", &self.fields.manual.key_secret)
                    .secure(true)
                    .on_input(|s| MyMessage::KeySecretChanged(s).into()),
            ]);
        } else {
            items.push(text("Using the configured API key").into());
        }

        items.extend(elem_list![
            rule::horizontal(1),
            bold_text("Model settings").size(18),
            toggler(v.enable_safety_checker)
                .label("Enable safety checker")
                .on_toggle(|b| MyMessage::SafetyCheckerToggled(b).into()),
            text!(
                "Safety tolerance: {} ({})",
                v.safety_tolerance,
                v.safety_tolerance.label()
            ),
            slider(
                SafetyTolerance::MIN..=SafetyTolerance::MAX,
                v.safety_tolerance.level(),
                |l| MyMessage::SafetyToleranceChanged(l).into()
            ),
            text("Image format"),
            row(OutputFormat::iter().map(|f| {
                radio(f.to_string(), f, Some(v.output_format), |f| {
                    MyMessage::OutputFormatSelected(f).into()
                })
                .into()
            }))
            .spacing(20),
            text("Aspect ratio"),
            pick_list(
                AspectRatio::iter().map(RatioChoice).collect::<Vec<_>>(),
                Some(RatioChoice(v.aspect_ratio)),
                |c| MyMessage::AspectRatioSelected(c.0).into()
            )
            .width(Length::Fill),
            toggler(v.raw)
                .label("Raw mode (less processed, more natural)")
                .on_toggle(|b| MyMessage::RawToggled(b).into()),
            rule::horizontal(1),
            bold_text("Advanced settings").size(18),
            toggler(v.use_seed)
                .label("Use a fixed seed")
                .on_toggle(|b| MyMessage::UseSeedToggled(b).into()),
        ]);

        if v.use_seed {
            items.push(
                text_input("Seed", &v.seed)
                    .on_input(|s| MyMessage::SeedChanged(s).into())
                    .into(),
            );
        }

        container(scrollable(column(items).spacing(12).padding(20)))
            .width(340)
            .height(Length::Fill)
            .into()
    }

    fn status_view<'a>(&'a self, ctx: &'a Context) -> Element<'a, UiMessage> {
        let color = match ctx.status {
            Status::Failed(_) => Color::from_rgb(0.8, 0.1, 0.1),
            Status::Succeeded => Color::from_rgb(0.1, 0.6, 0.2),
            _ => Color::from_rgb(0.3, 0.3, 0.3),
        };
        let mut col = vec![text(ctx.status.message()).color(color).into()];
        if let Some(p) = ctx.status.progress() {
            col.push(progress_bar(0.0..=100.0, p).into());
        }
        column(col).spacing(8).into()
    }

    fn result_view<'a>(&'a self, ctx: &'a Context) -> Option<Element<'a, UiMessage>> {
        let displayed = ctx.result.as_ref()?;
        let mut col = Vec::from(elem_list![
            widget::image(&displayed.handle).width(Length::Fill),
            italic_text("Generated image"),
        ]);
        for (label, value) in displayed.outcome.summary.rows() {
            col.push(row![bold_text(label), text(value)].spacing(10).into());
        }
        col.push(
            row![
                button("Save image").on_press(MyMessage::SaveImage.into()),
                button("Show result payload").on_press(MyMessage::ShowRawResult.into()),
            ]
            .spacing(10)
            .into(),
        );
        if let Some(path) = &displayed.saved_to {
            col.push(text!("Saved to {}", path.display()).into());
        }
        Some(column(col).spacing(10).into())
    }
}

impl State for Form {
    fn update(&mut self, event: UiMessage, ctx: &mut Context) -> Result<StateCommand> {
        let msg: MyMessage = event.try_into_ex()?;
        if self.fields.set(&msg)? {
            return cmd::none();
        }

        use MyMessage::*;
        match msg {
            PromptEdit(action) => {
                self.prompt.perform(action);
                cmd::none()
            }
            Generate => {
                ensure!(
                    !ctx.status.is_busy(),
                    "An image is already being generated"
                );
                self.fields.values.prompt = self.prompt.text();
                match ctx
                    .pipeline
                    .prepare(&self.fields.values, &self.fields.manual)
                {
                    Ok(job) => cmd::task(ctx.start_generation(job)),
                    Err(e) => {
                        ctx.fail(e.to_string());
                        Err(e.into())
                    }
                }
            }
            SaveImage => {
                ctx.save_result()?;
                cmd::none()
            }
            ShowRawResult => {
                let raw = match &ctx.result {
                    Some(displayed) => serde_json::to_string_pretty(&displayed.outcome.raw)?,
                    None => "No result yet".into(),
                };
                cmd::transition(Modal::message(State::clone(self), "Result payload", raw))
            }
            ShowTips => cmd::transition(Modal::message(
                State::clone(self),
                "Prompt tips",
                PROMPT_TIPS,
            )),
            _ => cmd::none(),
        }
    }

    fn view<'a>(&'a self, ctx: &'a Context) -> Element<'a, UiMessage> {
        let busy = ctx.status.is_busy();
        let mut main = Vec::from(elem_list![
            bold_text("FLUX1.1 Pro Image Generator").size(24),
            text("Generate images with the FLUX1.1 Pro model"),
            space().height(10),
            text("Image description:"),
            text_editor(&self.prompt)
                .placeholder("Describe the image you want in detail...")
                .height(120)
                .on_action(|a| MyMessage::PromptEdit(a).into()),
            button("Generate image")
                .on_press_maybe((!busy).then_some(UiMessage::from(MyMessage::Generate)))
                .width(Length::Fill),
            self.status_view(ctx),
        ]);

        if let Some(result) = self.result_view(ctx) {
            main.push(result);
        }

        main.extend(elem_list![
            rule::horizontal(1),
            row![
                space::horizontal(),
                button("Prompt tips").on_press(MyMessage::ShowTips.into())
            ],
            italic_text(FOOTER).size(12),
        ]);

        row![
            self.sidebar(ctx),
            rule::vertical(1),
            top_level_container(column(main).spacing(16).width(Length::Fill)),
        ]
        .height(Length::Fill)
        .into()
    }

    fn clone(&self) -> Box<dyn State> {
        Box::new(Clone::clone(self))
    }
}
