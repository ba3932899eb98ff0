//! Planar audio buffer

use crate::error::{RackError, RackResult};
use crate::{CHANNELS, Sample};

/// Multi-channel audio held one `Vec` per channel
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<Sample>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Silent buffer
    pub fn new(num_channels: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; num_channels],
            sample_rate,
        }
    }

    /// Silent buffer, failing instead of aborting when memory is short
    pub fn try_new(num_channels: usize, frames: usize, sample_rate: u32) -> RackResult<Self> {
        let mut channels = Vec::new();
        channels
            .try_reserve_exact(num_channels)
            .map_err(|e| RackError::ResourceExhausted(e.to_string()))?;
        for _ in 0..num_channels {
            let mut data: Vec<Sample> = Vec::new();
            data.try_reserve_exact(frames).map_err(|e| {
                RackError::ResourceExhausted(format!("{frames} frames per channel: {e}"))
            })?;
            data.resize(frames, 0.0);
            channels.push(data);
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Build from per-channel data; every channel must be the same length
    pub fn from_planar(channels: Vec<Vec<Sample>>, sample_rate: u32) -> RackResult<Self> {
        if channels.is_empty() {
            return Err(RackError::InvalidBuffer("no channels".into()));
        }
        let frames = channels[0].len();
        if let Some(bad) = channels.iter().position(|c| c.len() != frames) {
            return Err(RackError::InvalidBuffer(format!(
                "channel {bad} has {} frames, expected {frames}",
                channels[bad].len()
            )));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Deinterleave `samples` into `num_channels` channels
    pub fn from_interleaved(samples: &[Sample], num_channels: usize, sample_rate: u32) -> RackResult<Self> {
        if num_channels == 0 {
            return Err(RackError::InvalidBuffer("no channels".into()));
        }
        if samples.len() % num_channels != 0 {
            return Err(RackError::InvalidBuffer(format!(
                "{} samples do not divide into {num_channels} channels",
                samples.len()
            )));
        }
        let frames = samples.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in samples.chunks_exact(num_channels) {
            for (channel, &s) in channels.iter_mut().zip(frame) {
                channel.push(s);
            }
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<Sample>] {
        &self.channels
    }

    /// Two-channel view: mono is duplicated, extra channels are dropped
    pub fn to_stereo(&self) -> Self {
        let channels = match self.channels.len() {
            0 => vec![Vec::new(); CHANNELS],
            1 => vec![self.channels[0].clone(), self.channels[0].clone()],
            _ => self.channels[..CHANNELS].to_vec(),
        };
        Self {
            channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Peak absolute sample over all channels
    pub fn peak(&self) -> Sample {
        self.channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0, |peak: Sample, s| peak.max(s.abs()))
    }

    /// True when any sample is NaN or infinite
    pub fn has_non_finite(&self) -> bool {
        self.channels.iter().flat_map(|c| c.iter()).any(|s| !s.is_finite())
    }

    /// Cut every channel to `frames`
    pub fn truncate(&mut self, frames: usize) {
        for channel in &mut self.channels {
            channel.truncate(frames);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_planar_rejects_ragged() {
        assert!(AudioBuffer::from_planar(vec![vec![0.0; 4], vec![0.0; 3]], 44_100).is_err());
        assert!(AudioBuffer::from_planar(Vec::new(), 44_100).is_err());
    }

    #[test]
    fn test_from_interleaved() {
        let buf = AudioBuffer::from_interleaved(&[1.0, -1.0, 0.5, -0.5], 2, 48_000).unwrap();
        assert_eq!(buf.frames(), 2);
        assert_eq!(buf.channel(0), &[1.0, 0.5]);
        assert_eq!(buf.channel(1), &[-1.0, -0.5]);
        assert!(AudioBuffer::from_interleaved(&[0.0; 3], 2, 48_000).is_err());
    }

    #[test]
    fn test_to_stereo() {
        let mono = AudioBuffer::from_planar(vec![vec![0.25, 0.5]], 22_050).unwrap();
        let stereo = mono.to_stereo();
        assert_eq!(stereo.num_channels(), 2);
        assert_eq!(stereo.channel(1), &[0.25, 0.5]);

        let quad = AudioBuffer::new(4, 8, 22_050);
        assert_eq!(quad.to_stereo().num_channels(), 2);
    }

    #[test]
    fn test_duration_and_peak() {
        let mut buf = AudioBuffer::new(2, 44_100, 44_100);
        buf.channel_mut(1)[10] = -0.75;
        assert_eq!(buf.duration(), 1.0);
        assert_eq!(buf.peak(), 0.75);
        assert!(!buf.has_non_finite());
        buf.channel_mut(0)[0] = f64::NAN;
        assert!(buf.has_non_finite());
    }
}
