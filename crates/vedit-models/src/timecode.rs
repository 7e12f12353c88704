//! Parsing of user-supplied edit parameters.

use crate::error::{ModelError, ModelResult};
use crate::job::EditOperation;

/// Parse a timecode (`HH:MM:SS`, `MM:SS` or `SS`) to seconds.
///
/// Hours and minutes are whole numbers; the seconds component may carry a
/// fractional part.
pub fn parse_timecode(ts: &str) -> ModelResult<f64> {
    let ts = ts.trim();
    let parts: Vec<&str> = ts.split(':').collect();

    let whole = |s: &str| -> ModelResult<f64> {
        s.parse::<u32>()
            .map(f64::from)
            .map_err(|_| ModelError::invalid_timecode(ts))
    };
    let seconds = |s: &str| -> ModelResult<f64> {
        match s.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(ModelError::invalid_timecode(ts)),
        }
    };

    match parts.as_slice() {
        [s] => seconds(s),
        [m, s] => Ok(whole(m)? * 60.0 + seconds(s)?),
        [h, m, s] => Ok(whole(h)? * 3600.0 + whole(m)? * 60.0 + seconds(s)?),
        _ => Err(ModelError::invalid_timecode(ts)),
    }
}

/// Parse a crop directive of the form `start;end`.
pub fn parse_crop_range(text: &str) -> ModelResult<EditOperation> {
    let (start, end) = text
        .split_once(';')
        .ok_or_else(|| ModelError::invalid_timecode(text.trim()))?;
    EditOperation::crop(parse_timecode(start)?, parse_timecode(end)?)
}

/// Parse a speed multiplier such as `2` or `0.5`.
pub fn parse_speed_factor(text: &str) -> ModelResult<EditOperation> {
    let factor = text
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| ModelError::invalid_speed(text.trim()))?;
    EditOperation::speed(factor)
}
