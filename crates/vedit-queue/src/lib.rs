//! In-process FIFO job queue.
//!
//! This crate provides:
//! - Submission-ordered job storage shared between tasks
//! - Head claiming without removal, so the active job stays visible
//! - Queue position lookup for status reporting

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::JobQueue;
