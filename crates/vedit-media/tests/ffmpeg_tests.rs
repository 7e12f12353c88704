//! FFmpeg-backed transcoder tests.
//!
//! These generate synthetic clips with the lavfi sources, so they need
//! `ffmpeg` and `ffprobe` on PATH.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use vedit_media::{probe_video, FfmpegTranscoder, MediaError, Transcoder};

/// Render a synthetic clip of a solid colour with a sine audio track.
async fn make_clip(
    dir: &Path,
    name: &str,
    color: &str,
    secs: f64,
    size: &str,
    fps: u32,
) -> PathBuf {
    let path = dir.join(name);
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
        .arg(format!("color=c={color}:s={size}:r={fps}:d={secs}"))
        .args(["-f", "lavfi", "-i"])
        .arg(format!("sine=frequency=440:duration={secs}"))
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac", "-shortest"])
        .arg(&path)
        .status()
        .await
        .expect("failed to run ffmpeg");
    assert!(status.success(), "could not render {name}");
    path
}

/// RGB value of the centre pixel at `t` seconds.
async fn centre_pixel(path: &Path, t: f64) -> [u8; 3] {
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{t:.3}"), "-i"])
        .arg(path)
        .args(["-frames:v", "1", "-vf", "crop=2:2", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
        .output()
        .await
        .expect("failed to run ffmpeg");
    assert!(output.status.success());
    [output.stdout[0], output.stdout[1], output.stdout[2]]
}

fn dominant_channel(rgb: [u8; 3]) -> usize {
    (0..3).max_by_key(|&i| rgb[i]).unwrap()
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_crop_duration() {
    let dir = tempfile::tempdir().unwrap();
    let src = make_clip(dir.path(), "src.mp4", "red", 8.0, "320x240", 25).await;
    let out = dir.path().join("out.mp4");

    let transcoder = FfmpegTranscoder::default();
    let result = transcoder.crop(&src, 2.0, 5.0, &out).await.unwrap();
    assert_eq!(result, out);

    let info = probe_video(&out).await.unwrap();
    assert!((info.duration - 3.0).abs() < 0.25, "duration {}", info.duration);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_crop_rejects_bad_ranges_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let src = make_clip(dir.path(), "src.mp4", "red", 4.0, "320x240", 25).await;
    let out = dir.path().join("out.mp4");
    let transcoder = FfmpegTranscoder::default();

    let err = transcoder.crop(&src, 5.0, 2.0, &out).await.unwrap_err();
    assert!(matches!(err, MediaError::InvalidRange { .. }));

    let err = transcoder.crop(&src, 1.0, 30.0, &out).await.unwrap_err();
    assert!(matches!(err, MediaError::InvalidRange { .. }));

    assert!(!out.exists());
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_speed_halves_duration() {
    let dir = tempfile::tempdir().unwrap();
    let src = make_clip(dir.path(), "src.mp4", "blue", 6.0, "320x240", 25).await;
    let out = dir.path().join("out.mp4");

    FfmpegTranscoder::default().speed(&src, 2.0, &out).await.unwrap();

    let info = probe_video(&out).await.unwrap();
    assert!((info.duration - 3.0).abs() < 0.25, "duration {}", info.duration);
    assert!(info.has_audio);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_speed_rejects_non_positive_factor() {
    let dir = tempfile::tempdir().unwrap();
    let src = make_clip(dir.path(), "src.mp4", "blue", 2.0, "320x240", 25).await;
    let out = dir.path().join("out.mp4");
    let transcoder = FfmpegTranscoder::default();

    for factor in [0.0, -1.0] {
        let err = transcoder.speed(&src, factor, &out).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidSpeed(_)));
    }
    assert!(!out.exists());
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_concat_order_and_normalization() {
    let dir = tempfile::tempdir().unwrap();
    let a = make_clip(dir.path(), "a.mp4", "red", 1.0, "640x360", 25).await;
    let b = make_clip(dir.path(), "b.mp4", "green", 1.0, "320x240", 30).await;
    let c = make_clip(dir.path(), "c.mp4", "blue", 1.0, "1280x720", 24).await;
    let out = dir.path().join("out.mp4");

    FfmpegTranscoder::default()
        .concat(&[a, b, c], &out)
        .await
        .unwrap();

    let info = probe_video(&out).await.unwrap();
    assert_eq!((info.width, info.height), (640, 360));
    assert!((info.fps - 25.0).abs() < 0.1, "fps {}", info.fps);
    assert!((info.duration - 3.0).abs() < 0.3, "duration {}", info.duration);

    assert_eq!(dominant_channel(centre_pixel(&out, 0.5).await), 0);
    assert_eq!(dominant_channel(centre_pixel(&out, 1.5).await), 1);
    assert_eq!(dominant_channel(centre_pixel(&out, 2.5).await), 2);

    // Only the inputs and the output remain; scratch files are gone
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
}
