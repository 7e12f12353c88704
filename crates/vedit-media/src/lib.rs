//! FFmpeg CLI wrapper for the bot's editing operations.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe media inspection
//! - Crop, speed and concat operations behind the [`Transcoder`] trait

pub mod command;
pub mod edit;
pub mod error;
pub mod filters;
pub mod probe;
pub mod progress;
pub mod transcoder;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use edit::{concat_videos, crop_video, speed_video, EncodingConfig};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use transcoder::{FfmpegTranscoder, Transcoder};
