//! DSP Processor Wrappers
//!
//! AudioNode implementations around the rack-dsp building blocks, each
//! exposing its controls as sample-accurate [`AudioParam`]s.

use std::any::Any;

use rack_core::{CHANNELS, RENDER_QUANTUM};
use rack_dsp::{
    AudioParam, BiquadTDF2, Compressor, DelayLine, FilterType, GainBand, ImpulseResponse,
    MonoProcessor, PartitionedConvolver, Processor, StereoProcessor,
};

use crate::node::{AudioNode, Block, NodeType, ParamSlot, RenderClock, StereoBlock};

macro_rules! impl_any {
    () => {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    };
}

// ============ Filter Wrapper ============

/// Stereo biquad band with automatable gain (dB)
pub struct FilterNode {
    band: GainBand,
    filters: [BiquadTDF2; CHANNELS],
    gain: AudioParam,
    gains: Block,
}

impl FilterNode {
    pub fn new(filter_type: FilterType, freq: f64, q: f64, sample_rate: f64) -> Self {
        let mut band = GainBand::new(filter_type, freq, q, sample_rate);
        let coeffs = band.coeffs_for(0.0);
        Self {
            band,
            filters: [BiquadTDF2::with_coeffs(coeffs), BiquadTDF2::with_coeffs(coeffs)],
            gain: AudioParam::new(0.0, -40.0, 40.0, sample_rate),
            gains: [0.0; RENDER_QUANTUM],
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.band.filter_type()
    }
}

impl AudioNode for FilterNode {
    fn node_type(&self) -> NodeType {
        NodeType::Filter
    }

    fn process(&mut self, input: &StereoBlock, output: &mut StereoBlock, clock: RenderClock) {
        if !self.gain.is_automating() {
            let coeffs = self.band.coeffs_for(self.gain.value());
            for ((filter, src), dst) in self.filters.iter_mut().zip(&input.channels).zip(&mut output.channels) {
                filter.set_coeffs(coeffs);
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = filter.process_sample(s);
                }
            }
            return;
        }

        self.gain.fill(clock.frame, &mut self.gains);
        for i in 0..RENDER_QUANTUM {
            let coeffs = self.band.coeffs_for(self.gains[i]);
            for (ch, filter) in self.filters.iter_mut().enumerate() {
                filter.set_coeffs(coeffs);
                output.channels[ch][i] = filter.process_sample(input.channels[ch][i]);
            }
        }
    }

    fn param(&self, slot: ParamSlot) -> Option<&AudioParam> {
        (slot == ParamSlot::FilterGain).then_some(&self.gain)
    }

    fn param_mut(&mut self, slot: ParamSlot) -> Option<&mut AudioParam> {
        (slot == ParamSlot::FilterGain).then_some(&mut self.gain)
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    impl_any!();
}

// ============ Compressor Wrapper ============

/// Stereo-linked compressor; controls are read once per quantum
pub struct CompressorNode {
    compressor: Compressor,
    threshold: AudioParam,
    ratio: AudioParam,
    attack: AudioParam,
    release: AudioParam,
}

impl CompressorNode {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            compressor: Compressor::new(sample_rate),
            threshold: AudioParam::new(-24.0, -100.0, 0.0, sample_rate),
            ratio: AudioParam::new(12.0, 1.0, 20.0, sample_rate),
            attack: AudioParam::new(0.003, 0.0, 1.0, sample_rate),
            release: AudioParam::new(0.25, 0.0, 1.0, sample_rate),
        }
    }

    /// Gain reduction applied to the last frame, in dB
    pub fn gain_reduction_db(&self) -> f64 {
        self.compressor.gain_reduction_db()
    }
}

impl AudioNode for CompressorNode {
    fn node_type(&self) -> NodeType {
        NodeType::Dynamics
    }

    fn process(&mut self, input: &StereoBlock, output: &mut StereoBlock, clock: RenderClock) {
        let threshold = self.threshold.block_value(clock.frame, RENDER_QUANTUM);
        let ratio = self.ratio.block_value(clock.frame, RENDER_QUANTUM);
        let attack = self.attack.block_value(clock.frame, RENDER_QUANTUM);
        let release = self.release.block_value(clock.frame, RENDER_QUANTUM);

        self.compressor.set_threshold(threshold);
        self.compressor.set_ratio(ratio);
        self.compressor.set_times(attack, release);

        *output = *input;
        let [left, right] = &mut output.channels;
        self.compressor.process_block(left, right);
    }

    fn param(&self, slot: ParamSlot) -> Option<&AudioParam> {
        match slot {
            ParamSlot::Threshold => Some(&self.threshold),
            ParamSlot::Ratio => Some(&self.ratio),
            ParamSlot::Attack => Some(&self.attack),
            ParamSlot::Release => Some(&self.release),
            _ => None,
        }
    }

    fn param_mut(&mut self, slot: ParamSlot) -> Option<&mut AudioParam> {
        match slot {
            ParamSlot::Threshold => Some(&mut self.threshold),
            ParamSlot::Ratio => Some(&mut self.ratio),
            ParamSlot::Attack => Some(&mut self.attack),
            ParamSlot::Release => Some(&mut self.release),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.compressor.reset();
    }

    impl_any!();
}

// ============ Delay Wrapper ============

/// Stereo delay line with automatable delay time (seconds)
///
/// Defers its input, so it may sit inside a feedback cycle. The effective
/// delay never drops below one render quantum.
pub struct DelayNode {
    lines: [DelayLine; CHANNELS],
    delay_time: AudioParam,
    times: Block,
    sample_rate: f64,
}

impl DelayNode {
    pub fn new(max_delay_seconds: f64, sample_rate: f64) -> Self {
        let capacity = (max_delay_seconds * sample_rate).ceil() as usize + RENDER_QUANTUM;
        Self {
            lines: [DelayLine::new(capacity), DelayLine::new(capacity)],
            delay_time: AudioParam::new(0.0, 0.0, max_delay_seconds, sample_rate),
            times: [0.0; RENDER_QUANTUM],
            sample_rate,
        }
    }
}

impl AudioNode for DelayNode {
    fn node_type(&self) -> NodeType {
        NodeType::Delay
    }

    fn process(&mut self, _input: &StereoBlock, output: &mut StereoBlock, clock: RenderClock) {
        self.delay_time.fill(clock.frame, &mut self.times);
        let min = RENDER_QUANTUM as f64;
        for (line, dst) in self.lines.iter().zip(&mut output.channels) {
            for (i, (d, &t)) in dst.iter_mut().zip(&self.times).enumerate() {
                let delay = (t * self.sample_rate).max(min);
                // frame i of this quantum sits i writes ahead of the line
                *d = line.read(delay - i as f64);
            }
        }
    }

    fn defers_input(&self) -> bool {
        true
    }

    fn absorb(&mut self, input: &StereoBlock) {
        for (line, src) in self.lines.iter_mut().zip(&input.channels) {
            for &s in src {
                line.write(s);
            }
        }
    }

    fn param(&self, slot: ParamSlot) -> Option<&AudioParam> {
        (slot == ParamSlot::DelayTime).then_some(&self.delay_time)
    }

    fn param_mut(&mut self, slot: ParamSlot) -> Option<&mut AudioParam> {
        (slot == ParamSlot::DelayTime).then_some(&mut self.delay_time)
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.reset();
        }
    }

    impl_any!();
}

// ============ Convolver Wrapper ============

/// Stereo convolution against a normalised impulse response
pub struct ConvolverNode {
    convolvers: Vec<PartitionedConvolver>,
}

impl ConvolverNode {
    pub fn new(impulse: &ImpulseResponse) -> Self {
        let scale = impulse.normalization_scale();
        let sources = impulse.num_channels().max(1);
        let convolvers = (0..CHANNELS)
            .map(|ch| {
                let ir = if impulse.is_empty() { &[][..] } else { impulse.channel(ch % sources) };
                PartitionedConvolver::new(ir, RENDER_QUANTUM, scale)
            })
            .collect();
        Self { convolvers }
    }
}

impl AudioNode for ConvolverNode {
    fn node_type(&self) -> NodeType {
        NodeType::Convolver
    }

    fn process(&mut self, input: &StereoBlock, output: &mut StereoBlock, _clock: RenderClock) {
        for ((conv, src), dst) in self.convolvers.iter_mut().zip(&input.channels).zip(&mut output.channels) {
            conv.process_block(src, dst);
        }
    }

    fn reset(&mut self) {
        for conv in &mut self.convolvers {
            conv.reset();
        }
    }

    impl_any!();
}
