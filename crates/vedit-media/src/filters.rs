//! FFmpeg filter builders for the edit operations.

/// Range accepted by a single `atempo` stage.
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

/// Video filter retiming frames by `factor` (2.0 plays twice as fast).
pub fn speed_video_filter(factor: f64) -> String {
    format!("setpts=PTS/{}", format_number(factor))
}

/// Audio filter chain changing tempo by `factor` without altering pitch.
///
/// `atempo` only accepts 0.5..=2.0 per stage, so larger changes are split
/// into a chain whose product is `factor`.
pub fn speed_audio_filter(factor: f64) -> String {
    let mut stages = Vec::new();
    let mut remaining = factor;

    while remaining > ATEMPO_MAX {
        stages.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        stages.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    stages.push(remaining);

    stages
        .into_iter()
        .map(|s| format!("atempo={}", format_number(s)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Filter fitting any input into `width`x`height` at `fps`, letterboxed.
pub fn normalize_filter(width: u32, height: u32, fps: f64) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}",
        w = width,
        h = height,
        fps = format_number(fps)
    )
}

/// Round a dimension down to an even number, as libx264 requires.
pub fn even(dim: u32) -> u32 {
    (dim & !1).max(2)
}

/// Format a float without trailing zeros.
fn format_number(value: f64) -> String {
    let s = format!("{:.6}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
