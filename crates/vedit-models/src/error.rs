//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid timecode: {0}")]
    InvalidTimecode(String),

    #[error("Invalid crop range: start {start:.2}s must be before end {end:.2}s")]
    InvalidRange { start: f64, end: f64 },

    #[error("Invalid speed factor: {0}")]
    InvalidSpeed(String),

    #[error("Job has no source videos")]
    NoSources,

    #[error("{kind} takes exactly one source video, got {count}")]
    SourceCount { kind: &'static str, count: usize },
}

impl ModelError {
    pub fn invalid_timecode(msg: impl Into<String>) -> Self {
        Self::InvalidTimecode(msg.into())
    }

    pub fn invalid_speed(msg: impl Into<String>) -> Self {
        Self::InvalidSpeed(msg.into())
    }
}
