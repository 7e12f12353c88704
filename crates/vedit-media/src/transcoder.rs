//! The transcoder seam used by the processing loop.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::command::{check_ffmpeg, check_ffprobe};
use crate::edit::{concat_videos, crop_video, speed_video, EncodingConfig};
use crate::error::MediaResult;

/// Media transcoder contract.
///
/// Each operation writes to the given `output` path and returns it on
/// success. Parameter errors are reported before anything is written.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Keep `[start, end)` seconds of `input`.
    async fn crop(&self, input: &Path, start: f64, end: f64, output: &Path) -> MediaResult<PathBuf>;

    /// Change playback speed by `factor`.
    async fn speed(&self, input: &Path, factor: f64, output: &Path) -> MediaResult<PathBuf>;

    /// Join `inputs` in order, normalized to the first input's geometry.
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<PathBuf>;
}

/// Transcoder backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    encoding: EncodingConfig,
}

impl FfmpegTranscoder {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self { encoding }
    }

    /// Fail early when the required binaries are missing from PATH.
    pub fn check_available() -> MediaResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn crop(
        &self,
        input: &Path,
        start: f64,
        end: f64,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        crop_video(input, start, end, output, &self.encoding).await
    }

    async fn speed(&self, input: &Path, factor: f64, output: &Path) -> MediaResult<PathBuf> {
        speed_video(input, factor, output, &self.encoding).await
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<PathBuf> {
        concat_videos(inputs, output, &self.encoding).await
    }
}
