use std::{path::PathBuf, sync::Arc};

use color_eyre::{Result, eyre::eyre};
use engine::{
    CredentialResolver, GenerationOutcome, Pipeline, Status, config::Config,
    job::progress_channel, pipeline::PreparedJob,
};
use iced::{Task, widget::image::Handle};
use log::info;

use crate::{
    StringError,
    message::{ContextMessage, Message},
};

/// The latest successful generation, dropped when the next one starts
pub struct Displayed {
    pub outcome: Arc<GenerationOutcome>,
    pub handle: Handle,
    pub saved_to: Option<PathBuf>,
}

pub struct Context {
    pub config: Config,
    pub pipeline: Pipeline,
    pub status: Status,
    pub result: Option<Displayed>,
}

impl Context {
    pub fn from_config(config: Config) -> Self {
        let pipeline = Pipeline::new(&config, CredentialResolver::from_env());
        Self {
            config,
            pipeline,
            status: Status::Idle,
            result: None,
        }
    }

    pub fn needs_manual_credential(&self) -> bool {
        self.pipeline.resolver().needs_manual_entry()
    }

    /// Starts the job. Progress arrives through a bounded channel that is drained
    /// by its own task, so the job never waits on the UI.
    pub fn start_generation(&mut self, job: PreparedJob) -> Task<Message> {
        self.status = Status::Submitting;
        self.result = None;

        let (tx, updates) = progress_channel(self.config.progress_buffer);
        let progress = Task::run(updates, |update| {
            Message::Context(ContextMessage::Progress(update))
        });
        let run = Task::perform(self.pipeline.clone().execute(job, tx), |res| {
            Message::Context(ContextMessage::Finished(
                res.map(Arc::new).map_err(StringError::from),
            ))
        });
        Task::batch([progress, run])
    }

    /// Marks a failure that happened before anything was sent
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = Status::Failed(message.into());
        self.result = None;
    }

    pub fn update(&mut self, message: ContextMessage) -> Result<Task<Message>> {
        use ContextMessage::*;
        match message {
            Progress(update) => {
                // late updates must not revive a finished job
                if self.status.is_busy() {
                    self.status.apply(&update);
                }
                Ok(Task::none())
            }
            Finished(Ok(outcome)) => {
                let bitmap = &outcome.rendered.bitmap;
                let handle =
                    Handle::from_rgba(bitmap.width(), bitmap.height(), bitmap.as_raw().clone());
                self.status = Status::Succeeded;
                self.result = Some(Displayed {
                    outcome,
                    handle,
                    saved_to: None,
                });
                Ok(Task::none())
            }
            Finished(Err(e)) => {
                self.fail(e.message.clone());
                Err(eyre!("{}\n\n{}", self.status.message(), e.detail))
            }
        }
    }

    pub fn save_result(&mut self) -> Result<()> {
        let dir = self.config.download_dir()?;
        let displayed = self
            .result
            .as_mut()
            .ok_or(eyre!("There is no image to save"))?;
        let path = displayed.outcome.rendered.download.save_into(&dir)?;
        info!("Saved image to {}", path.display());
        displayed.saved_to = Some(path);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use engine::JobUpdate;

    use super::*;

    fn ctx() -> Context {
        Context::from_config(Config::default())
    }

    #[test]
    fn failure_clears_progress() {
        let mut ctx = ctx();
        ctx.status = Status::Submitting;
        ctx.update(ContextMessage::Progress(JobUpdate {
            queue_position: None,
            logs: vec!["step".into()],
        }))
        .unwrap();
        assert_eq!(ctx.status.message(), "step");

        let err = ctx
            .update(ContextMessage::Finished(Err(StringError {
                message: "boom".into(),
                detail: "Remote { message: \"boom\" }".into(),
            })))
            .unwrap_err();
        assert!(format!("{err}").contains("boom"));
        assert_eq!(ctx.status, Status::Failed("boom".into()));
        assert_eq!(ctx.status.progress(), None);
        assert!(!ctx.status.is_busy());
    }

    #[test]
    fn late_progress_is_ignored() {
        let mut ctx = ctx();
        ctx.status = Status::Succeeded;
        ctx.update(ContextMessage::Progress(JobUpdate::default()))
            .unwrap();
        assert_eq!(ctx.status, Status::Succeeded);
    }
}
