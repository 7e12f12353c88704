//! Gateway error types.

use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} rejected: {description}")]
    Api { method: String, description: String },

    #[error("{method} rate limited after {attempts} attempts")]
    RateLimited { method: String, attempts: u32 },

    #[error("{0} returned no result")]
    MissingResult(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    pub fn api(method: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Api {
            method: method.into(),
            description: description.into(),
        }
    }
}
