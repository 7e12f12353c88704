//! Shared data models for the VEdit bot.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and their editing operations
//! - Chat and media identifiers shared with the messaging gateway
//! - Timecode parsing for crop directives

pub mod error;
pub mod job;
pub mod timecode;

pub use error::{ModelError, ModelResult};
pub use job::{ChatId, EditOperation, Job, JobId, OperationKind, SourceRef};
pub use timecode::{parse_crop_range, parse_speed_factor, parse_timecode};
