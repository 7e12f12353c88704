//! Job definitions for queue processing.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Unique identifier for a job.
///
/// Used as the correlation key across the queue, the working file names and
/// the status messages, so it must stay filesystem-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Derive a job ID from submission time, submitter and message identity.
    ///
    /// Two submissions from the same user are distinguished by their message
    /// ID, and the microsecond timestamp separates restarts of the bot where
    /// message IDs could repeat.
    pub fn generate(user_id: i64, message_id: i64) -> Self {
        Self(format!(
            "{}_{}_{}",
            Utc::now().timestamp_micros(),
            user_id,
            message_id
        ))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat destination for status messages, results and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a source video held by the messaging gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(pub String);

impl SourceRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Editing operation requested for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditOperation {
    /// Keep the `[start, end)` range, in seconds.
    Crop { start: f64, end: f64 },
    /// Multiply playback speed by `factor`.
    Speed { factor: f64 },
    /// Join all sources in order.
    Concat,
}

impl EditOperation {
    /// Build a validated crop operation.
    pub fn crop(start: f64, end: f64) -> ModelResult<Self> {
        let op = Self::Crop { start, end };
        op.validate()?;
        Ok(op)
    }

    /// Build a validated speed operation.
    pub fn speed(factor: f64) -> ModelResult<Self> {
        let op = Self::Speed { factor };
        op.validate()?;
        Ok(op)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Crop { .. } => OperationKind::Crop,
            Self::Speed { .. } => OperationKind::Speed,
            Self::Concat => OperationKind::Concat,
        }
    }

    /// Check the parameter invariants of the operation.
    pub fn validate(&self) -> ModelResult<()> {
        match *self {
            Self::Crop { start, end } => {
                if !start.is_finite() || !end.is_finite() || start < 0.0 {
                    return Err(ModelError::invalid_timecode(format!("{start};{end}")));
                }
                if start >= end {
                    return Err(ModelError::InvalidRange { start, end });
                }
                Ok(())
            }
            Self::Speed { factor } => {
                if !factor.is_finite() || factor <= 0.0 {
                    return Err(ModelError::invalid_speed(factor.to_string()));
                }
                Ok(())
            }
            Self::Concat => Ok(()),
        }
    }
}

/// Parameterless operation tag, as chosen by the user before parameters
/// are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Crop,
    Speed,
    Concat,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Crop => "crop",
            OperationKind::Speed => "speed",
            OperationKind::Concat => "concat",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crop" => Ok(OperationKind::Crop),
            "speed" => Ok(OperationKind::Speed),
            "concat" => Ok(OperationKind::Concat),
            other => Err(format!("unknown operation: {other}")),
        }
    }
}

/// One unit of work: an operation applied to one or more source videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Where results and errors are delivered
    pub requester: ChatId,
    /// Requested edit
    pub operation: EditOperation,
    /// Source videos, in the order they were supplied
    pub sources: Vec<SourceRef>,
    /// Submission time
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a validated job.
    pub fn new(
        id: JobId,
        requester: ChatId,
        operation: EditOperation,
        sources: Vec<SourceRef>,
    ) -> ModelResult<Self> {
        let job = Self {
            id,
            requester,
            operation,
            sources,
            created_at: Utc::now(),
        };
        job.validate()?;
        Ok(job)
    }

    /// Check that the sources match the operation and its parameters are sane.
    pub fn validate(&self) -> ModelResult<()> {
        if self.sources.is_empty() {
            return Err(ModelError::NoSources);
        }
        match self.operation.kind() {
            kind @ (OperationKind::Crop | OperationKind::Speed) if self.sources.len() != 1 => {
                return Err(ModelError::SourceCount {
                    kind: kind.as_str(),
                    count: self.sources.len(),
                });
            }
            _ => {}
        }
        self.operation.validate()
    }
}
