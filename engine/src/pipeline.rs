use std::{
    fmt,
    time::{Duration, Instant, SystemTime},
};

use log::info;
use serde_json::Value;

use crate::{
    AspectRatio, Credential, CredentialResolver, FormState, GenerationRequest, JobClient,
    ManualEntry,
    config::Config,
    error::Result,
    job::{JobUpdate, ProgressSender},
    render::{self, RenderedImage},
};

/// Credential, form validation, job submission and rendering in one place
#[derive(Clone)]
pub struct Pipeline {
    resolver: CredentialResolver,
    jobs: JobClient,
    endpoint_id: String,
}

/// A request that passed all local checks and is ready to be sent
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub credential: Credential,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedDisplay {
    Resolved(u64),
    Random,
}

impl fmt::Display for SeedDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedDisplay::Resolved(seed) => write!(f, "{seed}"),
            SeedDisplay::Random => write!(f, "random"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultSummary {
    pub elapsed: Duration,
    pub prompt: String,
    pub seed: SeedDisplay,
    pub aspect_ratio: AspectRatio,
}

impl ResultSummary {
    pub fn rows(&self) -> [(&'static str, String); 4] {
        [
            (
                "Generation time",
                format!("{:.2} seconds", self.elapsed.as_secs_f64()),
            ),
            ("Prompt", self.prompt.clone()),
            ("Seed", self.seed.to_string()),
            ("Aspect ratio", self.aspect_ratio.to_string()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub rendered: RenderedImage,
    pub summary: ResultSummary,
    pub raw: Value,
}

impl Pipeline {
    pub fn new(config: &Config, resolver: CredentialResolver) -> Self {
        Self::with_client(
            JobClient::new(config.job_settings()),
            resolver,
            config.endpoint_id.clone(),
        )
    }

    pub fn with_client(jobs: JobClient, resolver: CredentialResolver, endpoint_id: String) -> Self {
        Self {
            resolver,
            jobs,
            endpoint_id,
        }
    }

    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    /// All checks that don't need the network. Fails before anything is sent.
    pub fn prepare(&self, form: &FormState, manual: &ManualEntry) -> Result<PreparedJob> {
        let credential = self.resolver.resolve(manual)?;
        let request = GenerationRequest::build(form)?;
        Ok(PreparedJob {
            credential,
            request,
        })
    }

    /// Runs the job to its terminal state and renders the result. `progress` is
    /// closed once the job is done, so a consumer stream ends before rendering.
    pub async fn execute(
        self,
        job: PreparedJob,
        progress: ProgressSender,
    ) -> Result<GenerationOutcome> {
        let PreparedJob {
            credential,
            request,
        } = job;
        let submitted_at = SystemTime::now();
        let started = Instant::now();

        let result = self
            .jobs
            .submit(&self.endpoint_id, &request, &credential, &progress)
            .await?;
        drop(progress);
        let elapsed = started.elapsed();

        let rendered = render::render(
            self.jobs.http(),
            &result,
            request.output_format,
            submitted_at,
        )
        .await?;
        info!(
            "Rendered {}x{} image as {}",
            rendered.width(),
            rendered.height(),
            rendered.download.file_name
        );

        Ok(GenerationOutcome {
            rendered,
            summary: ResultSummary {
                elapsed,
                prompt: result.prompt.clone().unwrap_or(request.prompt),
                seed: result
                    .seed
                    .map(SeedDisplay::Resolved)
                    .unwrap_or(SeedDisplay::Random),
                aspect_ratio: request.aspect_ratio,
            },
            raw: result.raw,
        })
    }

    pub async fn run(
        &self,
        form: &FormState,
        manual: &ManualEntry,
        progress: ProgressSender,
    ) -> Result<GenerationOutcome> {
        let job = self.prepare(form, manual)?;
        self.clone().execute(job, progress).await
    }
}

/// What the status line shows
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Status {
    #[default]
    Idle,
    Submitting,
    InProgress {
        updates: usize,
        last_line: Option<String>,
    },
    Succeeded,
    Failed(String),
}

impl Status {
    pub fn apply(&mut self, update: &JobUpdate) {
        let (updates, previous) = match self {
            Status::InProgress { updates, last_line } => (*updates, last_line.take()),
            _ => (0, None),
        };
        let last_line = update
            .logs
            .last()
            .cloned()
            .or_else(|| {
                update
                    .queue_position
                    .map(|pos| format!("Waiting in queue (position {pos})"))
            })
            .or(previous);
        *self = Status::InProgress {
            updates: updates + 1,
            last_line,
        };
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Status::Submitting | Status::InProgress { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Status::Idle => "Ready".into(),
            Status::Submitting => "Starting image generation...".into(),
            Status::InProgress {
                last_line: Some(line),
                ..
            } => line.clone(),
            Status::InProgress { updates, .. } => format!("Generating... ({updates} updates)"),
            Status::Succeeded => "Image generated successfully".into(),
            Status::Failed(e) => format!("Error while generating the image: {e}"),
        }
    }

    /// Percentage for the progress bar. `None` means the bar is hidden.
    pub fn progress(&self) -> Option<f32> {
        match self {
            Status::Submitting => Some(0.),
            Status::InProgress { updates, .. } => Some((10 + 5 * *updates).min(95) as f32),
            Status::Succeeded => Some(100.),
            Status::Idle | Status::Failed(_) => None,
        }
    }
}
