use std::time::Duration;

use thiserror::Error;

/// Everything that can abort a generation. Nothing here is retried automatically,
/// the user has to trigger the generation again.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Missing credential: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("The generation service reported a failure: {message}")]
    Remote { message: String },

    /// The job succeeded but carried no image. `raw` is the unmodified result body
    #[error("No image was returned in the result:\n{raw:#}")]
    EmptyResult { raw: serde_json::Value },

    #[error("The job did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Couldn't process the returned image: {0}")]
    Decode(#[from] image::ImageError),
}

impl GenerationError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Maps a non-success HTTP status of the generation service to the error taxonomy
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        use reqwest::StatusCode;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Self::Auth(format!("credential rejected ({status}): {body}"))
            }
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
                Self::Validation(format!("request rejected ({status}): {body}"))
            }
            _ => Self::remote(format!("{status} - {body}")),
        }
    }
}

pub type Result<T, E = GenerationError> = std::result::Result<T, E>;
