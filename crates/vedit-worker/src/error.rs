//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Downloaded file {index} is empty")]
    EmptySource { index: usize },

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] vedit_media::MediaError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] vedit_gateway::GatewayError),

    #[error("Queue error: {0}")]
    Queue(#[from] vedit_queue::QueueError),

    #[error("Invalid job: {0}")]
    Model(#[from] vedit_models::ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn delivery_failed(msg: impl Into<String>) -> Self {
        Self::DeliveryFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if the error was caused by what the user sent rather than by
    /// the bot or its dependencies.
    pub fn is_input_error(&self) -> bool {
        match self {
            WorkerError::EmptySource { .. } | WorkerError::Model(_) => true,
            WorkerError::Media(e) => e.is_input_error(),
            _ => false,
        }
    }
}
