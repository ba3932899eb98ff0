//! Output analysis: spectrum and level
//!
//! Spectrum follows the usual analyser-node conventions: Blackman window,
//! magnitudes normalised by FFT size, exponential smoothing of linear
//! magnitudes between frames, byte scaling over a fixed dB window.

use realfft::{RealFftPlanner, RealToComplex};
use rack_core::Sample;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;
use std::sync::Arc;

/// Default analysis window
pub const DEFAULT_FFT_SIZE: usize = 2048;
/// Default smoothing between successive spectra
pub const DEFAULT_SMOOTHING: f64 = 0.88;
/// Bottom of the byte-scaled spectrum range
pub const MIN_DECIBELS: f64 = -100.0;
/// Top of the byte-scaled spectrum range
pub const MAX_DECIBELS: f64 = -30.0;
/// Floor of the level meter
pub const METER_FLOOR_DB: f64 = -60.0;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

/// Spectrum analyser with an RMS level readout over the same window
pub struct SpectrumAnalyzer {
    fft: Arc<dyn RealToComplex<f64>>,
    fft_size: usize,
    smoothing: f64,
    /// Ring of the most recent `fft_size` mono samples
    history: Vec<f64>,
    write_pos: usize,
    window: Vec<f64>,
    scratch: Vec<f64>,
    spectrum: Vec<Complex<f64>>,
    smoothed: Vec<f64>,
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize, smoothing: f64) -> Self {
        // Validate FFT size (must be power of 2 and within range)
        let fft_size = if (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) && fft_size.is_power_of_two() {
            fft_size
        } else {
            log::warn!("FFT size {fft_size} unsupported, using {DEFAULT_FFT_SIZE}");
            DEFAULT_FFT_SIZE
        };

        let mut planner = RealFftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Blackman window (alpha = 0.16)
        let window = (0..fft_size)
            .map(|i| {
                let x = 2.0 * PI * i as f64 / fft_size as f64;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        Self {
            spectrum: fft.make_output_vec(),
            smoothed: vec![0.0; fft_size / 2],
            fft,
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            history: vec![0.0; fft_size],
            write_pos: 0,
            window,
            scratch: vec![0.0; fft_size],
        }
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins reported
    #[inline]
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Feed stereo frames; channels are averaged to mono
    pub fn push_stereo(&mut self, left: &[Sample], right: &[Sample]) {
        for (&l, &r) in left.iter().zip(right) {
            self.push((l + r) * 0.5);
        }
    }

    pub fn push_samples(&mut self, samples: &[Sample]) {
        for &s in samples {
            self.push(s);
        }
    }

    #[inline]
    fn push(&mut self, sample: Sample) {
        self.history[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.fft_size;
    }

    /// Most recent window, oldest sample first
    pub fn time_domain(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.fft_size);
        out.extend_from_slice(&self.history[self.write_pos..]);
        out.extend_from_slice(&self.history[..self.write_pos]);
        out
    }

    /// Run one analysis frame and return smoothed magnitudes in dB
    pub fn float_frequency_data(&mut self) -> Vec<f64> {
        self.analyze();
        self.smoothed
            .iter()
            .map(|&m| if m > 0.0 { 20.0 * m.log10() } else { f64::NEG_INFINITY })
            .collect()
    }

    /// Run one analysis frame and return magnitudes scaled to 0..=255
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let range = MAX_DECIBELS - MIN_DECIBELS;
        self.float_frequency_data()
            .into_iter()
            .map(|db| {
                let scaled = 255.0 / range * (db - MIN_DECIBELS);
                if scaled.is_nan() { 0 } else { scaled.clamp(0.0, 255.0) as u8 }
            })
            .collect()
    }

    fn analyze(&mut self) {
        // Rotate so the oldest sample sits at index 0, then window
        let (newer, older) = self.history.split_at(self.write_pos);
        for ((dst, &src), &w) in self
            .scratch
            .iter_mut()
            .zip(older.iter().chain(newer))
            .zip(&self.window)
        {
            *dst = src * w;
        }

        if self.fft.process(&mut self.scratch, &mut self.spectrum).is_err() {
            self.smoothed.fill(0.0);
            return;
        }

        let norm = 1.0 / self.fft_size as f64;
        let tau = self.smoothing;
        for (smoothed, c) in self.smoothed.iter_mut().zip(&self.spectrum) {
            let magnitude = c.norm() * norm;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }
    }

    /// RMS of the current window in dB, floored at [`METER_FLOOR_DB`]
    pub fn rms_db(&self) -> f64 {
        let sum: f64 = self.history.iter().map(|s| s * s).sum();
        let rms = (sum / self.fft_size as f64).sqrt();
        if rms <= 0.0 {
            return METER_FLOOR_DB;
        }
        (20.0 * rms.log10()).max(METER_FLOOR_DB)
    }

    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
        self.write_pos = 0;
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING)
    }
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("write_pos", &self.write_pos)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_shows_configuration() {
        let text = format!("{:?}", SpectrumAnalyzer::new(256, 0.5));
        assert!(text.starts_with("SpectrumAnalyzer"));
        assert!(text.contains("fft_size: 256"));
    }

    #[test]
    fn test_invalid_size_falls_back() {
        let analyzer = SpectrumAnalyzer::new(1000, 0.5);
        assert_eq!(analyzer.fft_size(), DEFAULT_FFT_SIZE);
        assert_eq!(analyzer.bin_count(), 1024);
    }

    #[test]
    fn test_silence_reads_floor() {
        let mut analyzer = SpectrumAnalyzer::default();
        assert_eq!(analyzer.rms_db(), METER_FLOOR_DB);
        assert!(analyzer.byte_frequency_data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rms_of_full_scale_square() {
        let mut analyzer = SpectrumAnalyzer::new(256, 0.0);
        let square: Vec<f64> = (0..256).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        analyzer.push_samples(&square);
        assert!(analyzer.rms_db().abs() < 1e-9);
    }

    #[test]
    fn test_sine_peaks_in_its_bin() {
        let size = 1024;
        let mut analyzer = SpectrumAnalyzer::new(size, 0.0);
        let bin = 64;
        let sine: Vec<f64> = (0..size)
            .map(|n| (2.0 * PI * bin as f64 * n as f64 / size as f64).sin())
            .collect();
        analyzer.push_stereo(&sine, &sine);
        let db = analyzer.float_frequency_data();
        let loudest = db
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(loudest.0, bin);
    }

    #[test]
    fn test_time_domain_order() {
        let mut analyzer = SpectrumAnalyzer::new(32, 0.0);
        let ramp: Vec<f64> = (0..40).map(|i| i as f64).collect();
        analyzer.push_samples(&ramp);
        let td = analyzer.time_domain();
        assert_eq!(td.first(), Some(&8.0));
        assert_eq!(td.last(), Some(&39.0));
    }
}
