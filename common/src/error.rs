use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    /// Retry budget exhausted against a remote source.
    #[error("Fetch error: {0}")]
    Fetch(String),
    #[error("Validation error: {0}")]
    Validation(String),
    /// Vector index rejected a request or returned an unusable body.
    #[error("Vector index error: {0}")]
    VectorIndex(String),
    /// Checkpoint file could not be read or written. Always fatal.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}
