use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::{sync::mpsc, time::sleep};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    Credential, GenerationRequest,
    error::{GenerationError, Result},
};

pub mod queue_api;
use queue_api::{JobHandle, QueueStatus};

/// Progress of an in-flight job. `logs` only holds lines that weren't part of an
/// earlier update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub queue_position: Option<u64>,
    pub logs: Vec<String>,
}

pub type ProgressSender = mpsc::Sender<JobUpdate>;
pub type ProgressStream = ReceiverStream<JobUpdate>;

/// Bounded single-producer/single-consumer channel for progress events. The
/// producer waits for capacity, so lines are never dropped or reordered.
pub fn progress_channel(capacity: usize) -> (ProgressSender, ProgressStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ReceiverStream::new(rx))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultImage {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub content_type: Option<String>,
}

/// Terminal output of a job, consumed once by the renderer
#[derive(Debug, Clone)]
pub struct JobResult {
    pub images: Vec<ResultImage>,
    pub prompt: Option<String>,
    pub seed: Option<u64>,
    /// The body as it came from the service, kept for diagnosis
    pub raw: Value,
}

#[derive(Deserialize)]
struct ResultBody {
    #[serde(default)]
    images: Vec<ResultImage>,
    prompt: Option<String>,
    seed: Option<Value>,
}

impl JobResult {
    pub fn from_value(raw: Value) -> Self {
        match ResultBody::deserialize(&raw) {
            Ok(body) => Self {
                images: body.images,
                prompt: body.prompt,
                seed: body.seed.as_ref().and_then(Value::as_u64),
                raw,
            },
            Err(e) => {
                warn!("Couldn't interpret result payload: {e}");
                Self {
                    images: vec![],
                    prompt: None,
                    seed: None,
                    raw,
                }
            }
        }
    }

    /// Only the first image counts, the request always asks for exactly one
    pub fn first_image(&self) -> Result<&ResultImage> {
        self.images
            .first()
            .ok_or_else(|| GenerationError::EmptyResult {
                raw: self.raw.clone(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Submitted,
    InProgress,
    Succeeded,
    Failed,
    TimedOut,
}

#[derive(Debug, Error)]
#[error("invalid job state transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut
        )
    }

    pub fn transition(&mut self, to: JobState) -> Result<(), InvalidTransition> {
        use JobState::*;
        let allowed = match (*self, to) {
            (Idle, Submitted) => true,
            (Idle, Failed) => true,
            (Submitted | InProgress, InProgress | Succeeded | Failed | TimedOut) => true,
            _ => false,
        };
        if !allowed {
            return Err(InvalidTransition { from: *self, to });
        }
        debug!("Job state: {self:?} -> {to:?}");
        *self = to;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub queue_base_url: String,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
}

/// Submits generation jobs and waits for them to finish
#[derive(Clone)]
pub struct JobClient {
    client: Client,
    settings: JobSettings,
}

impl JobClient {
    pub fn new(settings: JobSettings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(client: Client, settings: JobSettings) -> Self {
        Self { client, settings }
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Enqueues the job and waits until it reaches a terminal state. Every status
    /// poll while the job is queued or running is forwarded to `progress`.
    pub async fn submit(
        &self,
        endpoint_id: &str,
        request: &GenerationRequest,
        credential: &Credential,
        progress: &ProgressSender,
    ) -> Result<JobResult> {
        let authorization = credential.authorization_header();
        let mut state = JobState::Idle;

        let handle = match queue_api::enqueue(
            &self.client,
            &self.settings.queue_base_url,
            endpoint_id,
            request,
            &authorization,
        )
        .await
        {
            Ok(handle) => handle,
            Err(e) => {
                advance(&mut state, JobState::Failed)?;
                return Err(e);
            }
        };
        advance(&mut state, JobState::Submitted)?;
        info!("Submitted job {} to {endpoint_id}", handle.request_id);

        let wait = self.wait_for_completion(&handle, &authorization, &mut state, progress);
        let outcome = match self.settings.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(res) => res,
                Err(_) => Err(GenerationError::Timeout(limit)),
            },
            None => wait.await,
        };

        let terminal = match &outcome {
            Ok(_) => JobState::Succeeded,
            Err(GenerationError::Timeout(_)) => JobState::TimedOut,
            Err(_) => JobState::Failed,
        };
        advance(&mut state, terminal)?;
        info!("Job {} finished: {state:?}", handle.request_id);
        outcome
    }

    async fn wait_for_completion(
        &self,
        handle: &JobHandle,
        authorization: &str,
        state: &mut JobState,
        progress: &ProgressSender,
    ) -> Result<JobResult> {
        let mut forwarded_lines = 0;
        loop {
            let status = queue_api::status(&self.client, handle, authorization).await?;

            let new_lines = status
                .logs
                .unwrap_or_default()
                .into_iter()
                .skip(forwarded_lines)
                .map(|entry| entry.message)
                .collect::<Vec<_>>();
            forwarded_lines += new_lines.len();

            match status.status {
                QueueStatus::InQueue | QueueStatus::InProgress => {
                    advance(state, JobState::InProgress)?;
                    let update = JobUpdate {
                        queue_position: status.queue_position,
                        logs: new_lines,
                    };
                    if progress.send(update).await.is_err() {
                        debug!("Progress receiver is gone");
                    }
                    sleep(self.settings.poll_interval).await;
                }
                QueueStatus::Completed => {
                    if !new_lines.is_empty() {
                        _ = progress
                            .send(JobUpdate {
                                queue_position: None,
                                logs: new_lines,
                            })
                            .await;
                    }
                    if let Some(error) = status.error {
                        return Err(GenerationError::remote(error));
                    }
                    let raw = queue_api::result(&self.client, handle, authorization).await?;
                    return Ok(JobResult::from_value(raw));
                }
            }
        }
    }
}

fn advance(state: &mut JobState, to: JobState) -> Result<()> {
    state
        .transition(to)
        .map_err(|e| GenerationError::remote(e.to_string()))
}
