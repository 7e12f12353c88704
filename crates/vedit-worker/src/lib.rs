//! Chat-driven video editing bot.
//!
//! This crate provides:
//! - Intake of chat events into queued jobs
//! - The single processing loop (download, edit, deliver, clean up)
//! - Periodic queue position updates
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod intake;
pub mod logging;
pub mod metrics;
pub mod notifier;
pub mod processor;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use intake::{IntakeAdapter, PendingOperation, SessionStore};
pub use logging::JobLogger;
pub use notifier::{ProgressNotifier, StatusBoard};
pub use processor::{JobOutcome, ProcessingLoop};
pub use workspace::WorkDirs;
