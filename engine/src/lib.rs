pub mod config;
pub mod credential;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod render;
pub mod request;

#[cfg(test)]
mod test_server;

pub use credential::{Credential, CredentialResolver, CredentialSource, ManualEntry};
pub use error::GenerationError;
pub use job::{JobClient, JobResult, JobUpdate};
pub use pipeline::{GenerationOutcome, Pipeline, SeedDisplay, Status};
pub use request::{AspectRatio, FormState, GenerationRequest, OutputFormat, SafetyTolerance};
