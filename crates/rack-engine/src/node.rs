//! Audio graph nodes

use std::any::Any;
use std::sync::Arc;

use rack_core::{AudioBuffer, CHANNELS, RENDER_QUANTUM, Sample};
use rack_dsp::AudioParam;

/// Unique node identifier, dense within one context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Source,
    Gain,
    Filter,
    Dynamics,
    Delay,
    Convolver,
    Destination,
}

/// Automatable control on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSlot {
    Gain,
    FilterGain,
    DelayTime,
    Threshold,
    Ratio,
    Attack,
    Release,
}

/// One channel of one render quantum
pub type Block = [Sample; RENDER_QUANTUM];

/// Two channels of one render quantum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoBlock {
    pub channels: [Block; CHANNELS],
}

impl StereoBlock {
    pub const SILENT: Self = Self {
        channels: [[0.0; RENDER_QUANTUM]; CHANNELS],
    };

    #[inline]
    pub fn silence(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
    }

    /// Mix `other` into this block
    #[inline]
    pub fn accumulate(&mut self, other: &StereoBlock) {
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
    }

    pub fn is_silent(&self) -> bool {
        self.channels.iter().flatten().all(|&s| s == 0.0)
    }
}

impl Default for StereoBlock {
    fn default() -> Self {
        Self::SILENT
    }
}

/// Where a quantum sits on the context timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderClock {
    /// First frame of the quantum
    pub frame: u64,
    pub sample_rate: f64,
}

/// Audio node trait
///
/// Every node has one stereo input (the sum of everything connected to it)
/// and one stereo output.
pub trait AudioNode: Send + Sync {
    /// Node type
    fn node_type(&self) -> NodeType;

    /// Produce one quantum of output
    fn process(&mut self, input: &StereoBlock, output: &mut StereoBlock, clock: RenderClock);

    /// Nodes that can close a feedback cycle. Their output is produced from
    /// history before the rest of the graph runs; their input arrives
    /// afterwards through [`absorb`](Self::absorb).
    fn defers_input(&self) -> bool {
        false
    }

    /// Take this quantum's input (deferring nodes only)
    fn absorb(&mut self, _input: &StereoBlock) {}

    fn param(&self, _slot: ParamSlot) -> Option<&AudioParam> {
        None
    }

    fn param_mut(&mut self, _slot: ParamSlot) -> Option<&mut AudioParam> {
        None
    }

    /// Reset node state
    fn reset(&mut self);

    /// Downcast to concrete type
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Gain node with an automatable multiplier
pub struct GainNode {
    gain: AudioParam,
    gains: Block,
}

impl GainNode {
    /// Gain in `[0, max]`, starting at `initial`
    pub fn new(initial: f64, max: f64, sample_rate: f64) -> Self {
        Self {
            gain: AudioParam::new(initial, 0.0, max, sample_rate),
            gains: [0.0; RENDER_QUANTUM],
        }
    }

    /// Fixed unity gain, used for unit ports
    pub fn unity(sample_rate: f64) -> Self {
        Self::new(1.0, 1.0, sample_rate)
    }

    pub fn gain(&self) -> &AudioParam {
        &self.gain
    }
}

impl AudioNode for GainNode {
    fn node_type(&self) -> NodeType {
        NodeType::Gain
    }

    fn process(&mut self, input: &StereoBlock, output: &mut StereoBlock, clock: RenderClock) {
        if !self.gain.is_automating() {
            let g = self.gain.value();
            if g == 1.0 {
                *output = *input;
            } else if g == 0.0 {
                output.silence();
            } else {
                for (dst, src) in output.channels.iter_mut().zip(&input.channels) {
                    for (d, s) in dst.iter_mut().zip(src) {
                        *d = s * g;
                    }
                }
            }
            return;
        }

        self.gain.fill(clock.frame, &mut self.gains);
        for (dst, src) in output.channels.iter_mut().zip(&input.channels) {
            for ((d, s), g) in dst.iter_mut().zip(src).zip(&self.gains) {
                *d = s * g;
            }
        }
    }

    fn param(&self, slot: ParamSlot) -> Option<&AudioParam> {
        (slot == ParamSlot::Gain).then_some(&self.gain)
    }

    fn param_mut(&mut self, slot: ParamSlot) -> Option<&mut AudioParam> {
        (slot == ParamSlot::Gain).then_some(&mut self.gain)
    }

    fn reset(&mut self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Plays a stereo buffer from a start offset until its end
pub struct BufferSourceNode {
    buffer: Option<Arc<AudioBuffer>>,
    position: usize,
    playing: bool,
    finished: bool,
}

impl BufferSourceNode {
    pub fn new() -> Self {
        Self {
            buffer: None,
            position: 0,
            playing: false,
            finished: false,
        }
    }

    pub fn with_buffer(buffer: Arc<AudioBuffer>) -> Self {
        Self {
            buffer: Some(buffer),
            ..Self::new()
        }
    }

    /// Swap the buffer and hand back the previous one; playback stops
    pub fn set_buffer(&mut self, buffer: Arc<AudioBuffer>) -> Option<Arc<AudioBuffer>> {
        self.position = 0;
        self.playing = false;
        self.finished = false;
        self.buffer.replace(buffer)
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    /// Start output at `offset` frames into the buffer
    pub fn start(&mut self, offset: usize) {
        let frames = self.buffer.as_ref().map_or(0, |b| b.frames());
        self.position = offset.min(frames);
        self.playing = self.buffer.is_some();
        self.finished = false;
    }

    /// Stop output; returns the frame playback reached
    pub fn stop(&mut self) -> usize {
        self.playing = false;
        self.position
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// True once playback ran off the end of the buffer
    #[inline]
    pub fn has_finished(&self) -> bool {
        self.finished
    }
}

impl Default for BufferSourceNode {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for BufferSourceNode {
    fn node_type(&self) -> NodeType {
        NodeType::Source
    }

    fn process(&mut self, _input: &StereoBlock, output: &mut StereoBlock, _clock: RenderClock) {
        output.silence();
        let Some(buffer) = self.buffer.as_ref().filter(|_| self.playing) else {
            return;
        };

        let frames = buffer.frames();
        let count = frames.saturating_sub(self.position).min(RENDER_QUANTUM);
        let sources = buffer.num_channels().min(CHANNELS);
        for (ch, dst) in output.channels.iter_mut().enumerate().take(sources) {
            dst[..count].copy_from_slice(&buffer.channel(ch)[self.position..self.position + count]);
        }
        self.position += count;

        if self.position >= frames {
            self.playing = false;
            self.finished = true;
        }
    }

    fn reset(&mut self) {
        self.position = 0;
        self.playing = false;
        self.finished = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Graph sink; its output is the context output
pub struct DestinationNode;

impl AudioNode for DestinationNode {
    fn node_type(&self) -> NodeType {
        NodeType::Destination
    }

    fn process(&mut self, input: &StereoBlock, output: &mut StereoBlock, _clock: RenderClock) {
        *output = *input;
    }

    fn reset(&mut self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOCK: RenderClock = RenderClock {
        frame: 0,
        sample_rate: 48000.0,
    };

    fn ramp_block() -> StereoBlock {
        let mut block = StereoBlock::SILENT;
        for i in 0..RENDER_QUANTUM {
            block.channels[0][i] = i as f64 / RENDER_QUANTUM as f64;
            block.channels[1][i] = -(i as f64) / RENDER_QUANTUM as f64;
        }
        block
    }

    #[test]
    fn test_gain_node_static_paths() {
        let input = ramp_block();
        let mut out = StereoBlock::SILENT;

        let mut unity = GainNode::unity(48000.0);
        unity.process(&input, &mut out, CLOCK);
        assert_eq!(out, input);

        let mut mute = GainNode::new(0.0, 1.0, 48000.0);
        mute.process(&input, &mut out, CLOCK);
        assert!(out.is_silent());

        let mut half = GainNode::new(0.5, 1.0, 48000.0);
        half.process(&input, &mut out, CLOCK);
        assert_eq!(out.channels[0][64], 0.25);
    }

    #[test]
    fn test_gain_node_automation() {
        let mut node = GainNode::new(1.0, 1.0, 48000.0);
        node.param_mut(ParamSlot::Gain).unwrap().set_value_at(0.0, 10);
        assert!(node.param(ParamSlot::DelayTime).is_none());
        let mut input = StereoBlock::SILENT;
        input.channels[0].fill(1.0);
        let mut out = StereoBlock::SILENT;
        node.process(&input, &mut out, CLOCK);
        assert_eq!(out.channels[0][9], 1.0);
        assert_eq!(out.channels[0][10], 0.0);
    }

    #[test]
    fn test_buffer_source_plays_to_end() {
        let frames = RENDER_QUANTUM + 10;
        let buffer = AudioBuffer::from_planar(vec![vec![0.5; frames], vec![-0.5; frames]], 44100).unwrap();
        let mut source = BufferSourceNode::with_buffer(Arc::new(buffer));
        let mut out = StereoBlock::SILENT;

        source.process(&StereoBlock::SILENT, &mut out, CLOCK);
        assert!(out.is_silent(), "not started yet");

        source.start(0);
        source.process(&StereoBlock::SILENT, &mut out, CLOCK);
        assert!(out.channels[0].iter().all(|&s| s == 0.5));
        source.process(&StereoBlock::SILENT, &mut out, CLOCK);
        assert_eq!(out.channels[1][9], -0.5);
        assert_eq!(out.channels[1][10], 0.0);
        assert!(source.has_finished());
        assert!(!source.is_playing());
    }

    #[test]
    fn test_set_buffer_returns_previous() {
        let first = Arc::new(AudioBuffer::from_planar(vec![vec![0.1; 8]; 2], 8000).unwrap());
        let second = Arc::new(AudioBuffer::from_planar(vec![vec![0.2; 8]; 2], 8000).unwrap());
        let mut source = BufferSourceNode::new();
        assert!(source.set_buffer(first.clone()).is_none());
        source.start(4);
        let old = source.set_buffer(second).unwrap();
        assert!(Arc::ptr_eq(&old, &first));
        assert!(!source.is_playing());
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn test_buffer_source_offset_and_stop() {
        let ramp: Vec<f64> = (0..512).map(f64::from).collect();
        let buffer = AudioBuffer::from_planar(vec![ramp; 2], 44100).unwrap();
        let mut source = BufferSourceNode::with_buffer(Arc::new(buffer));
        source.start(300);
        let mut out = StereoBlock::SILENT;
        source.process(&StereoBlock::SILENT, &mut out, CLOCK);
        assert_eq!(out.channels[0][0], 300.0);
        assert_eq!(source.stop(), 300 + RENDER_QUANTUM);
    }
}
