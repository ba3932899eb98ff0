//! rack-core: Shared types for the fxrack signal chain
//!
//! This crate provides the effect catalog, the parameter store, chain
//! ordering and the planar audio buffer used by every other rack crate.

mod buffer;
mod catalog;
mod chain;
mod error;
mod state;
mod time;

pub use buffer::*;
pub use catalog::*;
pub use chain::*;
pub use error::*;
pub use state::*;
pub use time::*;

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Frames processed per render quantum, live and offline alike
pub const RENDER_QUANTUM: usize = 128;

/// Channel count of every processing graph
pub const CHANNELS: usize = 2;

/// Lowest sample rate a render context accepts
pub const MIN_SAMPLE_RATE: u32 = 3_000;

/// Highest sample rate a render context accepts
pub const MAX_SAMPLE_RATE: u32 = 768_000;

/// Decibel value
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Decibels(pub f64);

impl Decibels {
    pub const ZERO: Self = Self(0.0);
    pub const NEG_INF: Self = Self(f64::NEG_INFINITY);

    #[inline]
    pub fn from_gain(gain: f64) -> Self {
        if gain <= 0.0 {
            Self::NEG_INF
        } else {
            Self(20.0 * gain.log10())
        }
    }

    #[inline]
    pub fn to_gain(self) -> f64 {
        if self.0 <= -144.0 {
            0.0
        } else {
            10.0_f64.powf(self.0 / 20.0)
        }
    }
}

impl Default for Decibels {
    fn default() -> Self {
        Self::ZERO
    }
}

/// True when `rate` lies inside the accepted sample-rate window
#[inline]
pub fn is_valid_sample_rate(rate: u32) -> bool {
    (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate)
}
