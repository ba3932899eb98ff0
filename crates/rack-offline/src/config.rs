//! Configuration for offline renders

use serde::{Deserialize, Serialize};

use crate::error::{OfflineError, OfflineResult};
use rack_core::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};

/// Default export file prefix
pub const DEFAULT_FILE_PREFIX: &str = "Studio_Export";

/// One hour at 192 kHz
pub const DEFAULT_MAX_FRAMES: usize = 60 * 60 * 192_000;

/// Offline render configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Longest source a job accepts, in frames
    pub max_frames: usize,

    /// Export file names are `<prefix>_<unix millis>.wav`
    pub file_prefix: String,

    /// Lowest accepted source sample rate
    pub min_sample_rate: u32,

    /// Highest accepted source sample rate
    pub max_sample_rate: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            min_sample_rate: MIN_SAMPLE_RATE,
            max_sample_rate: MAX_SAMPLE_RATE,
        }
    }
}

impl RenderConfig {
    /// Set the frame ceiling
    pub fn with_max_frames(mut self, frames: usize) -> Self {
        self.max_frames = frames;
        self
    }

    /// Set the export file prefix
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Set the accepted sample-rate window
    pub fn with_sample_rate_window(mut self, min: u32, max: u32) -> Self {
        self.min_sample_rate = min;
        self.max_sample_rate = max;
        self
    }

    pub fn accepts_sample_rate(&self, rate: u32) -> bool {
        (self.min_sample_rate..=self.max_sample_rate).contains(&rate)
    }

    pub fn validate(&self) -> OfflineResult<()> {
        if self.max_frames == 0 {
            return Err(OfflineError::InvalidConfig("max_frames must be positive".into()));
        }
        if self.file_prefix.trim().is_empty() {
            return Err(OfflineError::InvalidConfig("file prefix is empty".into()));
        }
        if self.min_sample_rate == 0 || self.min_sample_rate > self.max_sample_rate {
            return Err(OfflineError::InvalidConfig(format!(
                "bad sample-rate window {}..={}",
                self.min_sample_rate, self.max_sample_rate
            )));
        }
        Ok(())
    }

    /// File name for an export made now
    pub fn suggested_file_name(&self) -> String {
        self.file_name_at(chrono::Utc::now().timestamp_millis())
    }

    /// File name for an export made at `millis` since the Unix epoch
    pub fn file_name_at(&self, millis: i64) -> String {
        format!("{}_{millis}.wav", self.file_prefix)
    }
}
