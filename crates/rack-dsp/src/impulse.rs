//! Reverb impulse synthesis
//!
//! A stereo burst of white noise under a quadratic decay envelope. The
//! generator is seeded, so every context built at the same sample rate
//! gets bit-identical impulses.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use rack_core::Sample;

/// Impulse length in seconds
pub const IMPULSE_SECONDS: f64 = 2.0;

/// Seed for the impulse noise
pub const IMPULSE_SEED: u64 = 0x5EED_F00D_2E7E_2B00;

const GAIN_CALIBRATION_DB: f64 = -58.0;
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;
const MIN_POWER: f64 = 0.000125;

/// Multi-channel impulse response
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    channels: Vec<Vec<Sample>>,
    sample_rate: f64,
}

impl ImpulseResponse {
    /// The rack reverb impulse: 2 channels, [`IMPULSE_SECONDS`] long
    pub fn decaying_noise(sample_rate: f64) -> Self {
        Self::decaying_noise_seeded(sample_rate, IMPULSE_SEED, IMPULSE_SECONDS)
    }

    pub fn decaying_noise_seeded(sample_rate: f64, seed: u64, seconds: f64) -> Self {
        let length = (sample_rate * seconds).max(0.0) as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let channels = (0..2)
            .map(|_| {
                (0..length)
                    .map(|i| {
                        let noise: f64 = rng.random::<f64>() * 2.0 - 1.0;
                        let decay = 1.0 - i as f64 / length as f64;
                        noise * decay * decay
                    })
                    .collect()
            })
            .collect();
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn from_channels(channels: Vec<Vec<Sample>>, sample_rate: f64) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    /// Output gain that levels a wet convolution path with its dry signal
    ///
    /// Inverse RMS power (floored), a fixed -58 dB calibration and
    /// compensation for the sample rate relative to 44.1 kHz.
    pub fn normalization_scale(&self) -> f64 {
        let count = self.num_channels() * self.len();
        let power = if count == 0 {
            0.0
        } else {
            let sum: f64 = self.channels.iter().flatten().map(|s| s * s).sum();
            (sum / count as f64).sqrt()
        };
        let mut scale = 1.0 / power.max(MIN_POWER);
        scale *= 10.0_f64.powf(GAIN_CALIBRATION_DB * 0.05);
        if self.sample_rate > 0.0 {
            scale *= GAIN_CALIBRATION_SAMPLE_RATE / self.sample_rate;
        }
        scale
    }
}
