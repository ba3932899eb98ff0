//! Biquad filter implementation using Transposed Direct Form II
//!
//! TDF-II is numerically optimal for floating-point arithmetic,
//! minimizing quantization noise and ensuring stability.
//! Coefficients follow the RBJ audio EQ cookbook.

use rack_core::Sample;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

use crate::{MonoProcessor, Processor};

/// Shelf slope S = 1 expressed as a Q
pub const SHELF_Q: f64 = FRAC_1_SQRT_2;

/// Biquad filter types used by the rack EQ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Peaking,
    LowShelf,
    HighShelf,
}

/// Biquad coefficients
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Angular terms shared by every design at a fixed frequency
#[derive(Debug, Clone, Copy)]
struct Omega {
    sin: f64,
    cos: f64,
}

impl Omega {
    fn new(freq: f64, sample_rate: f64) -> Self {
        // Frequencies above Nyquist are pinned to it
        let freq = freq.clamp(0.0, sample_rate * 0.5);
        let omega = 2.0 * PI * freq / sample_rate;
        Self {
            sin: omega.sin(),
            cos: omega.cos(),
        }
    }
}

impl BiquadCoeffs {
    /// Calculate peaking EQ coefficients
    pub fn peaking(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        Self::peaking_at(Omega::new(freq, sample_rate), q, gain_db)
    }

    /// Calculate low shelf filter coefficients
    pub fn low_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        Self::low_shelf_at(Omega::new(freq, sample_rate), q, gain_db)
    }

    /// Calculate high shelf filter coefficients
    pub fn high_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        Self::high_shelf_at(Omega::new(freq, sample_rate), q, gain_db)
    }

    /// Bypass (unity gain, no filtering)
    pub fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    fn peaking_at(w: Omega, q: f64, gain_db: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let alpha = w.sin / (2.0 * q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * w.cos;
        let b2 = 1.0 - alpha * a;
        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * w.cos;
        let a2 = 1.0 - alpha / a;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    fn low_shelf_at(w: Omega, q: f64, gain_db: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let alpha = w.sin / (2.0 * q);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) - (a - 1.0) * w.cos + two_sqrt_a_alpha);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * w.cos);
        let b2 = a * ((a + 1.0) - (a - 1.0) * w.cos - two_sqrt_a_alpha);
        let a0 = (a + 1.0) + (a - 1.0) * w.cos + two_sqrt_a_alpha;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * w.cos);
        let a2 = (a + 1.0) + (a - 1.0) * w.cos - two_sqrt_a_alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    fn high_shelf_at(w: Omega, q: f64, gain_db: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let alpha = w.sin / (2.0 * q);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) + (a - 1.0) * w.cos + two_sqrt_a_alpha);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * w.cos);
        let b2 = a * ((a + 1.0) + (a - 1.0) * w.cos - two_sqrt_a_alpha);
        let a0 = (a + 1.0) - (a - 1.0) * w.cos + two_sqrt_a_alpha;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * w.cos);
        let a2 = (a + 1.0) - (a - 1.0) * w.cos - two_sqrt_a_alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    #[inline]
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// TDF-II Biquad filter
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl BiquadTDF2 {
    pub fn new() -> Self {
        Self::with_coeffs(BiquadCoeffs::bypass())
    }

    pub fn with_coeffs(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    #[inline]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }
}

impl Default for BiquadTDF2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let output = self.coeffs.b0 * input + self.z1;
        self.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.z2;
        self.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }
}

/// Filter band whose gain is automated
///
/// Frequency and Q are fixed at construction; coefficients are only
/// recomputed when the requested gain differs from the last one.
#[derive(Debug, Clone)]
pub struct GainBand {
    filter_type: FilterType,
    omega: Omega,
    q: f64,
    gain_db: f64,
    coeffs: BiquadCoeffs,
}

impl GainBand {
    pub fn new(filter_type: FilterType, freq: f64, q: f64, sample_rate: f64) -> Self {
        let mut band = Self {
            filter_type,
            omega: Omega::new(freq, sample_rate),
            q,
            gain_db: f64::NAN,
            coeffs: BiquadCoeffs::bypass(),
        };
        band.coeffs_for(0.0);
        band
    }

    #[inline]
    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Coefficients for `gain_db`, cached between calls with the same gain
    #[inline]
    pub fn coeffs_for(&mut self, gain_db: f64) -> BiquadCoeffs {
        if gain_db.to_bits() != self.gain_db.to_bits() {
            self.gain_db = gain_db;
            self.coeffs = match self.filter_type {
                FilterType::Peaking => BiquadCoeffs::peaking_at(self.omega, self.q, gain_db),
                FilterType::LowShelf => BiquadCoeffs::low_shelf_at(self.omega, self.q, gain_db),
                FilterType::HighShelf => BiquadCoeffs::high_shelf_at(self.omega, self.q, gain_db),
            };
        }
        self.coeffs
    }
}
