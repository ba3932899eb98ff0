//! Fractional delay line

use rack_core::Sample;

/// Circular delay buffer with linearly interpolated reads
///
/// Reads are addressed relative to the next write position: a distance of
/// 1.0 is the most recently written sample.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<Sample>,
    write_pos: usize,
}

impl DelayLine {
    /// Room for reading up to `max_delay_samples` back
    pub fn new(max_delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay_samples.max(1) + 2],
            write_pos: 0,
        }
    }

    /// Longest readable distance
    #[inline]
    pub fn max_delay(&self) -> usize {
        self.buffer.len() - 2
    }

    /// Sample written `distance` writes ago (fractional, clamped to `[1, max]`)
    #[inline]
    pub fn read(&self, distance: f64) -> Sample {
        let distance = distance.clamp(1.0, self.max_delay() as f64);
        let whole = distance.floor();
        let frac = distance - whole;
        let newer = self.tap(whole as usize);
        if frac == 0.0 {
            return newer;
        }
        let older = self.tap(whole as usize + 1);
        newer + (older - newer) * frac
    }

    #[inline]
    fn tap(&self, distance: usize) -> Sample {
        let len = self.buffer.len();
        self.buffer[(self.write_pos + len - distance) % len]
    }

    #[inline]
    pub fn write(&mut self, sample: Sample) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
