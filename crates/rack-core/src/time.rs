//! Time helpers

/// `m:ss` clock display. NaN and negative input show as `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{minutes}:{secs:02}")
}

#[inline]
pub fn seconds_to_frames(seconds: f64, sample_rate: f64) -> u64 {
    (seconds.max(0.0) * sample_rate).round() as u64
}

#[inline]
pub fn frames_to_seconds(frames: u64, sample_rate: f64) -> f64 {
    frames as f64 / sample_rate
}
