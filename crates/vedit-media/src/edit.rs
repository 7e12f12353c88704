//! Crop, speed and concat operations.
//!
//! Every operation validates its parameters before FFmpeg is started and
//! writes only to the caller-provided output path. On failure nothing is
//! left at that path.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{even, normalize_filter, speed_audio_filter, speed_video_filter};
use crate::probe::{probe_video, VideoInfo};
use crate::progress::FfmpegProgress;

/// Slack allowed when comparing the requested end against the probed
/// duration, which ffprobe reports rounded.
const DURATION_EPSILON: f64 = 0.001;

/// Encoding settings shared by every re-encoding operation.
#[derive(Debug, Clone)]
pub struct EncodingConfig {
    pub codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

impl EncodingConfig {
    fn apply(&self, cmd: FfmpegCommand, with_audio: bool) -> FfmpegCommand {
        let cmd = cmd
            .video_codec(&self.codec)
            .preset(&self.preset)
            .crf(self.crf)
            .output_args(["-pix_fmt", "yuv420p", "-movflags", "+faststart"]);
        if with_audio {
            cmd.audio_codec(&self.audio_codec)
                .output_arg("-b:a")
                .output_arg(&self.audio_bitrate)
        } else {
            cmd.no_audio()
        }
    }
}

/// Check a crop range against the media duration.
pub fn validate_crop_range(start: f64, end: f64, duration: f64) -> MediaResult<()> {
    if !start.is_finite()
        || !end.is_finite()
        || start < 0.0
        || end > duration + DURATION_EPSILON
        || start >= end
    {
        return Err(MediaError::InvalidRange { start, end, duration });
    }
    Ok(())
}

/// Check a speed multiplier.
pub fn validate_speed(factor: f64) -> MediaResult<()> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(MediaError::InvalidSpeed(factor));
    }
    Ok(())
}

/// Keep the `[start, end)` range of `input`.
///
/// The input is probed first; the range must lie within its duration.
pub async fn crop_video(
    input: &Path,
    start: f64,
    end: f64,
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<PathBuf> {
    let info = probe_video(input).await?;
    validate_crop_range(start, end, info.duration)?;

    info!(
        "Cropping {} -> {} ({:.2}s..{:.2}s of {:.2}s)",
        input.display(),
        output.display(),
        start,
        end,
        info.duration
    );

    let cmd = FfmpegCommand::new(input, output)
        .seek(start)
        .duration(end - start);
    let cmd = encoding.apply(cmd, info.has_audio);

    FfmpegRunner::new()
        .run_with_progress(&cmd, log_progress(end - start))
        .await?;

    Ok(output.to_path_buf())
}

/// Change playback speed of `input` by `factor`.
pub async fn speed_video(
    input: &Path,
    factor: f64,
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<PathBuf> {
    validate_speed(factor)?;
    let info = probe_video(input).await?;

    info!(
        "Changing speed of {} -> {} (x{})",
        input.display(),
        output.display(),
        factor
    );

    let cmd = if info.has_audio {
        FfmpegCommand::new(input, output)
            .filter_complex(format!(
                "[0:v]{}[v];[0:a]{}[a]",
                speed_video_filter(factor),
                speed_audio_filter(factor)
            ))
            .map("[v]")
            .map("[a]")
    } else {
        FfmpegCommand::new(input, output).video_filter(speed_video_filter(factor))
    };
    let cmd = encoding.apply(cmd, info.has_audio);

    FfmpegRunner::new()
        .run_with_progress(&cmd, log_progress(info.duration / factor))
        .await?;

    Ok(output.to_path_buf())
}

/// Join `inputs` in order into `output`.
///
/// Every input is first re-encoded to the resolution and frame rate of the
/// first one (letterboxed when aspect ratios differ) with a uniform audio
/// layout, so the concat demuxer can join them without corrupting the
/// container. Intermediate files live in a temporary directory next to the
/// output and are removed when this function returns.
pub async fn concat_videos(
    inputs: &[PathBuf],
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<PathBuf> {
    let first = inputs.first().ok_or(MediaError::NoInputs)?;
    let target = probe_video(first).await?;
    let (width, height) = (even(target.width), even(target.height));

    info!(
        "Concatenating {} inputs -> {} (target {}x{} @ {:.3} fps)",
        inputs.len(),
        output.display(),
        width,
        height,
        target.fps
    );

    let scratch_parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let scratch = tempfile::tempdir_in(scratch_parent)?;
    // The demuxer resolves list entries relative to the list file
    let scratch_dir = tokio::fs::canonicalize(scratch.path()).await?;

    let mut normalized = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let info = probe_video(input).await?;
        let part = scratch_dir.join(format!("part_{index}.mp4"));
        normalize_part(input, &info, &part, width, height, target.fps, encoding).await?;
        normalized.push(part);
    }

    let list_path = scratch_dir.join("list.txt");
    tokio::fs::write(&list_path, concat_list(&normalized)).await?;

    let cmd = FfmpegCommand::new(&list_path, output)
        .input_args(["-f", "concat", "-safe", "0"])
        .codec_copy()
        .output_args(["-movflags", "+faststart"]);
    FfmpegRunner::new().run(&cmd).await?;

    Ok(output.to_path_buf())
}

/// Re-encode one concat input to the common geometry.
///
/// Inputs without audio get a silent track so all parts share one layout.
async fn normalize_part(
    input: &Path,
    info: &VideoInfo,
    output: &Path,
    width: u32,
    height: u32,
    fps: f64,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    debug!("Normalizing {} -> {}", input.display(), output.display());

    let mut cmd = FfmpegCommand::new(input, output);
    if !info.has_audio {
        cmd = cmd
            .extra_input(
                ["-f", "lavfi"],
                "anullsrc=channel_layout=stereo:sample_rate=44100",
            )
            .map("0:v:0")
            .map("1:a:0")
            .output_arg("-shortest");
    }
    let cmd = cmd
        .video_filter(normalize_filter(width, height, fps))
        .output_args(["-ar", "44100", "-ac", "2"]);
    let cmd = encoding.apply(cmd, true);

    FfmpegRunner::new().run(&cmd).await
}

/// Concat demuxer list file contents.
fn concat_list(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| {
            let path = p.to_string_lossy().replace('\'', "'\\''");
            format!("file '{path}'\n")
        })
        .collect()
}

/// Progress callback logging percentage of the expected output duration.
fn log_progress(expected_secs: f64) -> impl Fn(FfmpegProgress) + Send + 'static {
    let total_ms = (expected_secs * 1000.0) as i64;
    move |p: FfmpegProgress| {
        debug!(
            "FFmpeg progress: {:.0}% (frame {}, {:.2}x)",
            p.percentage(total_ms),
            p.frame,
            p.speed
        );
    }
}
