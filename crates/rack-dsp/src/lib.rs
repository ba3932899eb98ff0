//! rack-dsp: DSP building blocks for fxrack
//!
//! ## Modules
//! - `biquad` - TDF-II biquad filters (peaking, shelving)
//! - `dynamics` - Envelope follower and stereo-linked soft-knee compressor
//! - `delay` - Fractional delay line
//! - `convolution` - Zero-latency uniformly partitioned FFT convolution
//! - `impulse` - Seeded decaying-noise impulse response
//! - `smoothing` - Sample-accurate automatable parameters
//! - `analysis` - Spectrum analyser and RMS level meter

pub mod analysis;
pub mod biquad;
pub mod convolution;
pub mod delay;
pub mod dynamics;
pub mod impulse;
pub mod smoothing;

pub use analysis::*;
pub use biquad::*;
pub use convolution::*;
pub use delay::*;
pub use dynamics::*;
pub use impulse::*;
pub use smoothing::*;

use rack_core::Sample;

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

/// Stereo processor trait
pub trait StereoProcessor: Processor {
    /// Process a stereo sample pair
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample);

    /// Process stereo blocks
    fn process_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        debug_assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process_sample(*l, *r);
        }
    }
}
