#![allow(dead_code)]
//! Wire types and raw calls of the job queue. Some fields are only kept for
//! debug output.
use log::debug;
use reqwest::{Client, header};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    GenerationRequest,
    error::{GenerationError, Result},
};

#[derive(Debug, Deserialize)]
pub struct EnqueueResponse {
    pub request_id: String,
    pub status_url: Option<String>,
    pub response_url: Option<String>,
    pub cancel_url: Option<String>,
    pub queue_position: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    InQueue,
    InProgress,
    Completed,
}

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: QueueStatus,
    pub queue_position: Option<u64>,
    #[serde(default)]
    pub logs: Option<Vec<LogEntry>>,
    pub error: Option<String>,
    pub error_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub level: Option<String>,
    pub timestamp: Option<String>,
}

/// Status and result locations of an enqueued job
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub request_id: String,
    pub status_url: String,
    pub response_url: String,
}

impl JobHandle {
    pub fn from_response(base_url: &str, endpoint_id: &str, resp: EnqueueResponse) -> Self {
        // requests live under the application id, which is the first two path segments
        let app_id = endpoint_id.split('/').take(2).collect::<Vec<_>>().join("/");
        let requests = format!(
            "{}/{app_id}/requests/{}",
            base_url.trim_end_matches('/'),
            resp.request_id
        );
        Self {
            status_url: resp
                .status_url
                .unwrap_or_else(|| format!("{requests}/status")),
            response_url: resp.response_url.unwrap_or(requests),
            request_id: resp.request_id,
        }
    }
}

pub async fn enqueue(
    client: &Client,
    base_url: &str,
    endpoint_id: &str,
    body: &GenerationRequest,
    authorization: &str,
) -> Result<JobHandle> {
    let url = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint_id.trim_start_matches('/')
    );
    debug!("Enqueueing job at {url}: {body:?}");

    let resp = client
        .post(&url)
        .header(header::AUTHORIZATION, authorization)
        .header(header::ACCEPT, "application/json")
        .json(body)
        .send()
        .await?;

    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(GenerationError::from_status(status, text));
    }

    let enqueued = serde_json::from_str::<EnqueueResponse>(&text).map_err(|e| {
        GenerationError::remote(format!("unexpected enqueue response ({e}): {text}"))
    })?;
    debug!("Enqueued: {enqueued:#?}");
    Ok(JobHandle::from_response(base_url, endpoint_id, enqueued))
}

pub async fn status(client: &Client, handle: &JobHandle, authorization: &str) -> Result<StatusResponse> {
    let resp = client
        .get(&handle.status_url)
        .query(&[("logs", "1")])
        .header(header::AUTHORIZATION, authorization)
        .header(header::ACCEPT, "application/json")
        .send()
        .await?;

    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(GenerationError::from_status(status, text));
    }

    serde_json::from_str(&text)
        .map_err(|e| GenerationError::remote(format!("unexpected status response ({e}): {text}")))
}

pub async fn result(client: &Client, handle: &JobHandle, authorization: &str) -> Result<Value> {
    let resp = client
        .get(&handle.response_url)
        .header(header::AUTHORIZATION, authorization)
        .header(header::ACCEPT, "application/json")
        .send()
        .await?;

    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(match GenerationError::from_status(status, text.clone()) {
            GenerationError::Remote { .. } => {
                GenerationError::remote(error_detail(&text).unwrap_or(text))
            }
            other => other,
        });
    }

    serde_json::from_str(&text)
        .map_err(|e| GenerationError::remote(format!("unexpected result payload ({e}): {text}")))
}

/// Pulls the human readable part out of an error body like `{"detail": ...}`
fn error_detail(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    match value.get("detail")? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
