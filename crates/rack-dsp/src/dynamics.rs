//! Dynamics processing
//!
//! - Peak envelope follower with separate attack/release
//! - Stereo-linked soft-knee compressor (VCA style)

use rack_core::Sample;

use crate::{Processor, StereoProcessor};

/// Knee width of the rack compressor
pub const DEFAULT_KNEE_DB: f64 = 30.0;

/// One-pole coefficient reaching 1 - 1/e of a step after `seconds`
#[inline]
fn time_coeff(seconds: f64, sample_rate: f64) -> f64 {
    if seconds <= 0.0 {
        0.0
    } else {
        (-1.0 / (seconds * sample_rate)).exp()
    }
}

/// Envelope follower for dynamics processing
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    attack_coeff: f64,
    release_coeff: f64,
    attack_s: f64,
    release_s: f64,
    envelope: f64,
    sample_rate: f64,
}

impl EnvelopeFollower {
    pub fn new(sample_rate: f64) -> Self {
        let mut follower = Self {
            attack_coeff: 0.0,
            release_coeff: 0.0,
            attack_s: f64::NAN,
            release_s: f64::NAN,
            envelope: 0.0,
            sample_rate,
        };
        follower.set_times(0.003, 0.25);
        follower
    }

    /// Set attack and release times in seconds
    pub fn set_times(&mut self, attack_s: f64, release_s: f64) {
        if attack_s != self.attack_s {
            self.attack_s = attack_s;
            self.attack_coeff = time_coeff(attack_s, self.sample_rate);
        }
        if release_s != self.release_s {
            self.release_s = release_s;
            self.release_coeff = time_coeff(release_s, self.sample_rate);
        }
    }

    #[inline(always)]
    pub fn process(&mut self, input: Sample) -> f64 {
        let abs_input = input.abs();
        let coeff = if abs_input > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = abs_input + coeff * (self.envelope - abs_input);
        self.envelope
    }

    #[inline]
    pub fn envelope(&self) -> f64 {
        self.envelope
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

/// Stereo-linked compressor
///
/// Both channels share one detector (the louder side), so the stereo
/// image does not shift under gain reduction.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f64,
    ratio: f64,
    knee_db: f64,
    envelope: EnvelopeFollower,
    gain_reduction: f64,
}

impl Compressor {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 4.0,
            knee_db: DEFAULT_KNEE_DB,
            envelope: EnvelopeFollower::new(sample_rate),
            gain_reduction: 0.0,
        }
    }

    pub fn set_threshold(&mut self, db: f64) {
        self.threshold_db = db.clamp(-100.0, 0.0);
    }

    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio.clamp(1.0, 20.0);
    }

    pub fn set_knee(&mut self, db: f64) {
        self.knee_db = db.clamp(0.0, 40.0);
    }

    /// Attack and release in seconds
    pub fn set_times(&mut self, attack_s: f64, release_s: f64) {
        self.envelope.set_times(attack_s.clamp(0.0, 1.0), release_s.clamp(0.0, 1.0));
    }

    /// Current gain reduction in dB (positive = reducing)
    pub fn gain_reduction_db(&self) -> f64 {
        self.gain_reduction
    }

    #[inline]
    fn calculate_gain_reduction(&self, input_db: f64) -> f64 {
        let half_knee = self.knee_db / 2.0;
        let knee_start = self.threshold_db - half_knee;
        let knee_end = self.threshold_db + half_knee;
        let slope = 1.0 - 1.0 / self.ratio;

        if input_db < knee_start {
            0.0
        } else if input_db > knee_end || self.knee_db <= 0.0 {
            (input_db - self.threshold_db) * slope
        } else {
            let x = input_db - knee_start;
            (slope * x * x) / (2.0 * self.knee_db)
        }
    }
}

impl Processor for Compressor {
    fn reset(&mut self) {
        self.envelope.reset();
        self.gain_reduction = 0.0;
    }
}

impl StereoProcessor for Compressor {
    #[inline]
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let envelope = self.envelope.process(left.abs().max(right.abs()));

        if envelope < 1e-10 {
            self.gain_reduction = 0.0;
            return (left, right);
        }

        let env_db = 20.0 * envelope.log10();
        let gr_db = self.calculate_gain_reduction(env_db);
        self.gain_reduction = gr_db;

        let gain = 10.0_f64.powf(-gr_db / 20.0);
        (left * gain, right * gain)
    }
}
