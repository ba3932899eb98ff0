//! Live engine
//!
//! Split into a control half ([`LiveChain`], owned by the UI/event thread)
//! and a real-time half ([`LiveProcessor`], owned by the audio callback).
//! The control half keeps the parameter store and chain order, turns edits
//! into control updates and sends them over a lock-free queue. The audio
//! half applies them at the start of each quantum and renders.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use rack_core::{
    AudioBuffer, ChainOrder, EffectKind, ParameterState, RackError, RackResult, RENDER_QUANTUM,
    frames_to_seconds, is_valid_sample_rate, seconds_to_frames,
};
use rack_dsp::{DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING, METER_FLOOR_DB, SpectrumAnalyzer};
use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::automation::{AutomationEngine, ControlUpdate};
use crate::context::{ContextKind, EngineContext};
use crate::factory::UnitSet;
use crate::graph::ChainGraph;
use crate::node::StereoBlock;

/// Live engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub sample_rate: u32,
    /// Control messages that fit in the queue before the backlog kicks in
    pub queue_capacity: usize,
    pub fft_size: usize,
    pub smoothing: f64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            queue_capacity: 1024,
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl LiveConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_analyzer(mut self, fft_size: usize, smoothing: f64) -> Self {
        self.fft_size = fft_size;
        self.smoothing = smoothing;
        self
    }
}

/// Fixed-size route, so the message itself carries no heap data. Applying
/// it reuses the router and context buffers sized when the graph was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePlan {
    slots: [Option<EffectKind>; EffectKind::COUNT],
    len: usize,
}

impl RoutePlan {
    pub fn kinds(&self) -> impl Iterator<Item = EffectKind> + '_ {
        self.slots[..self.len].iter().flatten().copied()
    }
}

impl From<&ChainOrder> for RoutePlan {
    fn from(order: &ChainOrder) -> Self {
        let mut slots = [None; EffectKind::COUNT];
        for (slot, kind) in slots.iter_mut().zip(order.iter()) {
            *slot = Some(kind);
        }
        Self {
            slots,
            len: order.len().min(EffectKind::COUNT),
        }
    }
}

/// Control thread -> audio thread
#[derive(Debug, Clone)]
pub enum ControlMessage {
    Rewire(RoutePlan),
    Automate { update: ControlUpdate, smoothed: bool },
    LoadSource(Arc<AudioBuffer>),
    /// Start playback; `None` resumes where the source stopped
    Play { from: Option<usize> },
    Pause,
    /// Move the play head, keeping the current play/pause state
    Seek { frame: usize },
}

impl ControlMessage {
    /// Messages that change the transport state published by the audio thread
    fn is_transport(&self) -> bool {
        matches!(
            self,
            ControlMessage::LoadSource(_) | ControlMessage::Play { .. } | ControlMessage::Pause | ControlMessage::Seek { .. }
        )
    }
}

/// Atomic float for lock-free metering
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// State published by the audio thread
///
/// Only the audio thread writes these; the control side reads them.
#[derive(Debug)]
pub struct LiveShared {
    pub frame: AtomicU64,
    /// Play head in source frames
    pub position: AtomicU64,
    pub playing: AtomicBool,
    /// Set when playback ran off the end of the source
    pub ended: AtomicBool,
    /// Transport messages applied so far
    pub transport_applied: AtomicU64,
    pub level_db: AtomicF64,
    pub analyzer: Mutex<SpectrumAnalyzer>,
}

impl LiveShared {
    fn new(config: &LiveConfig) -> Self {
        Self {
            frame: AtomicU64::new(0),
            position: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            transport_applied: AtomicU64::new(0),
            level_db: AtomicF64::new(METER_FLOOR_DB),
            analyzer: Mutex::new(SpectrumAnalyzer::new(config.fft_size, config.smoothing)),
        }
    }
}

/// One read of the analysis tap
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSnapshot {
    /// Byte-scaled magnitude per frequency bin
    pub spectrum: Vec<u8>,
    /// RMS level in dB, floored at -60
    pub level_db: f64,
}

/// Build a live engine for `order` and `state`
pub fn live_engine(config: LiveConfig, order: ChainOrder, state: ParameterState) -> RackResult<(LiveChain, LiveProcessor)> {
    if !is_valid_sample_rate(config.sample_rate) {
        return Err(RackError::InvalidSampleRate(config.sample_rate));
    }

    let mut ctx = EngineContext::new(ContextKind::Live, config.sample_rate);
    let graph = ChainGraph::build(&mut ctx, &order, &state);
    let (producer, consumer) = RingBuffer::new(config.queue_capacity.max(1));
    // At most one retired buffer per queued message
    let (retire, reclaim) = RingBuffer::new(config.queue_capacity.max(1));
    let shared = Arc::new(LiveShared::new(&config));

    let chain = LiveChain {
        producer,
        reclaim,
        backlog: VecDeque::new(),
        units: *graph.units(),
        state,
        order,
        shared: shared.clone(),
        sample_rate: config.sample_rate,
        source_frames: None,
        transport_sent: 0,
        order_listener: None,
    };
    let processor = LiveProcessor {
        ctx,
        graph,
        consumer,
        retire,
        shared,
        pending: StereoBlock::SILENT,
        cursor: RENDER_QUANTUM,
    };

    log::info!("live engine ready at {} Hz", config.sample_rate);
    Ok((chain, processor))
}

type OrderListener = Box<dyn FnMut(&ChainOrder) + Send>;

/// Control half of the live engine
///
/// Transport queries (`is_playing`, `has_ended`, `position_seconds`) report
/// what the audio thread last applied. Requests still in flight are visible
/// through [`transport_pending`](Self::transport_pending).
pub struct LiveChain {
    producer: Producer<ControlMessage>,
    /// Buffers the audio thread swapped out, released here
    reclaim: Consumer<Arc<AudioBuffer>>,
    /// Messages that did not fit in the queue, oldest first
    backlog: VecDeque<ControlMessage>,
    units: UnitSet,
    state: ParameterState,
    order: ChainOrder,
    shared: Arc<LiveShared>,
    sample_rate: u32,
    source_frames: Option<usize>,
    /// Transport messages handed to `send`
    transport_sent: u64,
    order_listener: Option<OrderListener>,
}

impl LiveChain {
    /// Store a value and ramp the live control toward it; returns the
    /// stored (clamped) value
    pub fn set_param(&mut self, kind: EffectKind, param: &str, value: f64) -> RackResult<f64> {
        let edit = self.state.set(kind, param, value)?;
        let update = AutomationEngine::control_update(self.units.get(kind), &self.state, edit.target);
        if !update.is_empty() {
            self.send(ControlMessage::Automate { update, smoothed: true });
        }
        self.state.value(kind, param)
    }

    pub fn set_bypass(&mut self, kind: EffectKind, bypass: bool) {
        let edit = self.state.set_bypass(kind, bypass);
        let update = AutomationEngine::control_update(self.units.get(kind), &self.state, edit.target);
        self.send(ControlMessage::Automate { update, smoothed: true });
    }

    /// Flip the bypass flag; returns the new flag
    pub fn toggle_bypass(&mut self, kind: EffectKind) -> bool {
        let bypass = !self.state.is_bypassed(kind);
        self.set_bypass(kind, bypass);
        bypass
    }

    /// Every parameter back to its default, ramped
    pub fn reset_parameters(&mut self) {
        self.state.reset();
        for update in AutomationEngine::snapshot(&self.units, &self.state) {
            self.send(ControlMessage::Automate { update, smoothed: true });
        }
    }

    /// Called with the new order after every reorder. Chain order outlives
    /// the session, so callers that own a store persist it here.
    pub fn on_order_change(&mut self, listener: impl FnMut(&ChainOrder) + Send + 'static) {
        self.order_listener = Some(Box::new(listener));
    }

    /// Replace the chain order and rewire
    pub fn set_order(&mut self, order: ChainOrder) {
        log::info!("chain order: {order}");
        self.send(ControlMessage::Rewire(RoutePlan::from(&order)));
        self.order = order;
        if let Some(listener) = self.order_listener.as_mut() {
            listener(&self.order);
        }
    }

    /// Reorder gesture: move the unit at `from` to `to`
    pub fn move_unit(&mut self, from: usize, to: usize) -> RackResult<&ChainOrder> {
        let mut order = self.order.clone();
        order.move_unit(from, to)?;
        self.set_order(order);
        Ok(&self.order)
    }

    /// Hand a decoded source to the audio thread; playback stops
    pub fn load(&mut self, buffer: AudioBuffer) -> RackResult<()> {
        if buffer.is_empty() {
            return Err(RackError::InvalidBuffer("source has no frames".into()));
        }
        if buffer.sample_rate() != self.sample_rate {
            return Err(RackError::InvalidBuffer(format!(
                "source is {} Hz, engine runs at {} Hz",
                buffer.sample_rate(),
                self.sample_rate
            )));
        }
        let stereo = buffer.to_stereo();
        self.source_frames = Some(stereo.frames());
        log::info!("loaded source: {} frames", stereo.frames());
        self.send(ControlMessage::LoadSource(Arc::new(stereo)));
        Ok(())
    }

    /// Start or resume playback
    pub fn play(&mut self) -> RackResult<()> {
        if self.source_frames.is_none() {
            return Err(RackError::InvalidBuffer("no source loaded".into()));
        }
        self.send(ControlMessage::Play { from: None });
        Ok(())
    }

    /// Stop playback, keeping the position
    pub fn pause(&mut self) {
        self.send(ControlMessage::Pause);
    }

    /// Move the play head to `seconds` into the source
    pub fn seek(&mut self, seconds: f64) {
        let Some(frames) = self.source_frames else {
            return;
        };
        let frame = (seconds_to_frames(seconds.max(0.0), self.sample_rate as f64) as usize).min(frames);
        self.send(ControlMessage::Seek { frame });
    }

    /// True while transport requests have not reached the audio thread
    pub fn transport_pending(&self) -> bool {
        self.shared.transport_applied.load(Ordering::Acquire) != self.transport_sent
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    /// True once playback reached the end of the source and no newer
    /// transport request is on its way
    pub fn has_ended(&self) -> bool {
        !self.transport_pending() && self.shared.ended.load(Ordering::Acquire)
    }

    pub fn position_seconds(&self) -> f64 {
        frames_to_seconds(self.shared.position.load(Ordering::Acquire), self.sample_rate as f64)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.source_frames
            .map_or(0.0, |f| frames_to_seconds(f as u64, self.sample_rate as f64))
    }

    /// Read the analysis tap
    pub fn analysis(&self) -> AnalysisSnapshot {
        let spectrum = self.shared.analyzer.lock().byte_frequency_data();
        AnalysisSnapshot {
            spectrum,
            level_db: self.shared.level_db.load(),
        }
    }

    pub fn parameters(&self) -> &ParameterState {
        &self.state
    }

    pub fn order(&self) -> &ChainOrder {
        &self.order
    }

    pub fn units(&self) -> &UnitSet {
        &self.units
    }

    pub fn shared(&self) -> &Arc<LiveShared> {
        &self.shared
    }

    /// Messages waiting for room in the queue
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Release buffers the audio thread swapped out; returns how many
    pub fn reclaim(&mut self) -> usize {
        let mut released = 0;
        while self.reclaim.pop().is_ok() {
            released += 1;
        }
        released
    }

    /// Move backlogged messages into the queue while it has room
    pub fn flush(&mut self) {
        while let Some(msg) = self.backlog.pop_front() {
            if let Err(PushError::Full(msg)) = self.producer.push(msg) {
                self.backlog.push_front(msg);
                break;
            }
        }
    }

    fn send(&mut self, msg: ControlMessage) {
        self.reclaim();
        self.flush();
        if msg.is_transport() {
            self.transport_sent += 1;
        }
        if !self.backlog.is_empty() {
            self.backlog.push_back(msg);
            return;
        }
        if let Err(PushError::Full(msg)) = self.producer.push(msg) {
            log::warn!("control queue full, holding message");
            self.backlog.push_back(msg);
        }
    }
}

/// Real-time half of the live engine
pub struct LiveProcessor {
    ctx: EngineContext,
    graph: ChainGraph,
    consumer: Consumer<ControlMessage>,
    /// Swapped-out sources go back to the control side to be freed
    retire: Producer<Arc<AudioBuffer>>,
    shared: Arc<LiveShared>,
    /// Last rendered quantum, read out by [`fill_interleaved`](Self::fill_interleaved)
    pending: StereoBlock,
    cursor: usize,
}

impl LiveProcessor {
    /// Apply queued control messages (call at the start of each quantum)
    fn process_messages(&mut self) {
        while let Ok(msg) = self.consumer.pop() {
            let transport = msg.is_transport();
            match msg {
                ControlMessage::Rewire(plan) => {
                    self.graph.rewire(&mut self.ctx, plan.kinds());
                }
                ControlMessage::Automate { update, smoothed } => {
                    let now = self.ctx.current_frame();
                    AutomationEngine::write(&mut self.ctx, &update, now, smoothed);
                }
                transport_msg => self.apply_transport(transport_msg),
            }
            if transport {
                self.shared.transport_applied.fetch_add(1, Ordering::Release);
            }
        }
    }

    fn apply_transport(&mut self, msg: ControlMessage) {
        let shared = &self.shared;
        let Some(source) = self.graph.source_mut(&mut self.ctx) else {
            return;
        };
        match msg {
            ControlMessage::LoadSource(buffer) => {
                if let Some(old) = source.set_buffer(buffer) {
                    // Full only if the control side stopped reclaiming; then it drops here
                    let _ = self.retire.push(old);
                }
            }
            ControlMessage::Play { from } => {
                let offset = from.unwrap_or(if source.has_finished() { 0 } else { source.position() });
                source.start(offset);
            }
            ControlMessage::Pause => {
                source.stop();
            }
            ControlMessage::Seek { frame } => {
                let playing = source.is_playing();
                source.start(frame);
                if !playing {
                    source.stop();
                }
            }
            ControlMessage::Rewire(_) | ControlMessage::Automate { .. } => return,
        }
        shared.position.store(source.position() as u64, Ordering::Release);
        shared.playing.store(source.is_playing(), Ordering::Release);
        shared.ended.store(false, Ordering::Release);
    }

    /// Render one quantum of live output
    pub fn render_quantum(&mut self) -> StereoBlock {
        self.process_messages();

        let block = *self.ctx.render_quantum();
        self.update_transport();

        if let Some(mut analyzer) = self.shared.analyzer.try_lock() {
            let [left, right] = &block.channels;
            analyzer.push_stereo(left, right);
            self.shared.level_db.store(analyzer.rms_db());
        }
        self.shared.frame.store(self.ctx.current_frame(), Ordering::Relaxed);
        block
    }

    fn update_transport(&mut self) {
        let shared = &self.shared;
        let Some(source) = self.graph.source_mut(&mut self.ctx) else {
            return;
        };
        if source.is_playing() {
            shared.position.store(source.position() as u64, Ordering::Release);
        } else if source.has_finished() && shared.playing.load(Ordering::Acquire) {
            // auto-stop: back to the start
            shared.position.store(0, Ordering::Release);
            shared.playing.store(false, Ordering::Release);
            shared.ended.store(true, Ordering::Release);
            log::info!("playback reached end of source");
        }
    }

    /// Fill an interleaved device buffer, rendering quanta as needed.
    /// Mono devices get the channel average; extra channels stay silent.
    pub fn fill_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            if self.cursor >= RENDER_QUANTUM {
                self.pending = self.render_quantum();
                self.cursor = 0;
            }
            let left = self.pending.channels[0][self.cursor];
            let right = self.pending.channels[1][self.cursor];
            match frame {
                [mono] => *mono = (0.5 * (left + right)) as f32,
                [l, r, rest @ ..] => {
                    *l = left as f32;
                    *r = right as f32;
                    rest.fill(0.0);
                }
                [] => {}
            }
            self.cursor += 1;
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn graph(&self) -> &ChainGraph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(sr: u32) -> (LiveChain, LiveProcessor) {
        live_engine(LiveConfig::default().with_sample_rate(sr), ChainOrder::default(), ParameterState::new()).unwrap()
    }

    fn source(frames: usize, sr: u32) -> AudioBuffer {
        AudioBuffer::from_planar(vec![vec![0.25; frames]; 2], sr).unwrap()
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        let result = live_engine(LiveConfig::default().with_sample_rate(100), ChainOrder::default(), ParameterState::new());
        assert!(matches!(result, Err(RackError::InvalidSampleRate(100))));
    }

    #[test]
    fn test_load_rejects_mismatched_rate() {
        let (mut chain, _) = engine(8000);
        assert!(chain.load(source(100, 44100)).is_err());
        assert!(chain.play().is_err());
        assert!(chain.load(source(100, 8000)).is_ok());
        assert!(chain.play().is_ok());
    }

    #[test]
    fn test_auto_stop_resets_position() {
        let (mut chain, mut processor) = engine(8000);
        chain.load(source(300, 8000)).unwrap();
        chain.play().unwrap();
        processor.render_quantum();
        assert!(chain.is_playing());
        assert_eq!(chain.position_seconds(), 128.0 / 8000.0);
        processor.render_quantum();
        processor.render_quantum();
        assert!(!chain.is_playing());
        assert!(chain.has_ended());
        assert_eq!(chain.position_seconds(), 0.0);
    }

    #[test]
    fn test_pause_and_resume_keep_position() {
        let (mut chain, mut processor) = engine(8000);
        chain.load(source(8000, 8000)).unwrap();
        chain.play().unwrap();
        processor.render_quantum();
        processor.render_quantum();
        chain.pause();
        processor.render_quantum();
        assert_eq!(chain.position_seconds(), 256.0 / 8000.0);
        chain.play().unwrap();
        processor.render_quantum();
        assert_eq!(chain.position_seconds(), 384.0 / 8000.0);
    }

    #[test]
    fn test_seek_while_paused() {
        let (mut chain, mut processor) = engine(8000);
        chain.load(source(8000, 8000)).unwrap();
        chain.seek(0.5);
        processor.render_quantum();
        assert!(!chain.is_playing());
        assert_eq!(chain.position_seconds(), 0.5);
        chain.play().unwrap();
        processor.render_quantum();
        assert_eq!(chain.position_seconds(), (4000.0 + 128.0) / 8000.0);
    }

    #[test]
    fn test_replay_after_end_behind_full_queue() {
        let config = LiveConfig::default().with_sample_rate(8000).with_queue_capacity(2);
        let (mut chain, mut processor) = live_engine(config, ChainOrder::default(), ParameterState::new()).unwrap();
        chain.load(source(300, 8000)).unwrap();
        chain.play().unwrap();
        for _ in 0..3 {
            processor.render_quantum();
        }
        assert!(chain.has_ended());

        chain.toggle_bypass(EffectKind::Eq);
        chain.toggle_bypass(EffectKind::Eq);
        chain.play().unwrap();
        assert_eq!(chain.backlog_len(), 1);
        assert!(chain.transport_pending());
        assert!(!chain.has_ended());

        // Play still waiting on the control side
        processor.render_quantum();
        assert!(!chain.is_playing());
        assert!(!chain.has_ended());

        chain.flush();
        let block = processor.render_quantum();
        assert!(!block.is_silent());
        assert!(!chain.transport_pending());
        assert!(chain.is_playing());
        assert!(!chain.has_ended());
        assert_eq!(chain.position_seconds(), 128.0 / 8000.0);
    }

    #[test]
    fn test_seek_while_playing_keeps_playing() {
        let (mut chain, mut processor) = engine(8000);
        chain.load(source(8000, 8000)).unwrap();
        chain.play().unwrap();
        processor.render_quantum();
        chain.seek(0.25);
        processor.render_quantum();
        assert!(chain.is_playing());
        assert_eq!(chain.position_seconds(), (2000.0 + 128.0) / 8000.0);
    }

    #[test]
    fn test_replaced_source_is_released_on_control_side() {
        let (mut chain, mut processor) = engine(8000);
        chain.load(source(100, 8000)).unwrap();
        processor.render_quantum();
        assert_eq!(chain.reclaim(), 0);

        chain.load(source(200, 8000)).unwrap();
        processor.render_quantum();
        assert_eq!(chain.reclaim(), 1);
        assert_eq!(chain.reclaim(), 0);
    }

    #[test]
    fn test_order_listener_sees_every_reorder() {
        use std::sync::Mutex as StdMutex;

        let (mut chain, _) = engine(8000);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        chain.on_order_change(move |order| sink.lock().unwrap().push(order.ids()));

        chain.move_unit(0, 3).unwrap();
        chain.set_order(ChainOrder::empty());
        assert!(chain.move_unit(0, 1).is_err());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], vec!["compressor", "delay", "reverb", "eq"]);
        assert!(seen[1].is_empty());
    }

    #[test]
    fn test_set_param_returns_clamped_value() {
        let (mut chain, _) = engine(8000);
        assert_eq!(chain.set_param(EffectKind::Delay, "feedback", 3.0).unwrap(), 0.9);
        assert!(chain.set_param(EffectKind::Delay, "nope", 1.0).is_err());
        assert!(chain.toggle_bypass(EffectKind::Reverb));
        assert!(chain.parameters().is_bypassed(EffectKind::Reverb));
    }

    #[test]
    fn test_full_queue_uses_backlog() {
        let config = LiveConfig::default().with_sample_rate(8000).with_queue_capacity(2);
        let (mut chain, mut processor) = live_engine(config, ChainOrder::default(), ParameterState::new()).unwrap();
        for _ in 0..5 {
            chain.toggle_bypass(EffectKind::Eq);
        }
        assert_eq!(chain.backlog_len(), 3);
        processor.render_quantum();
        chain.flush();
        assert_eq!(chain.backlog_len(), 1);
    }

    #[test]
    fn test_move_unit_rewires() {
        let (mut chain, mut processor) = engine(8000);
        let order = chain.move_unit(3, 0).unwrap().ids();
        assert_eq!(order, vec!["reverb", "eq", "compressor", "delay"]);
        processor.render_quantum();
        let reverb = chain.units().get(EffectKind::Reverb);
        let wiring = processor.graph().router().wiring();
        assert_eq!(wiring[0].to, reverb.input());
    }

    #[test]
    fn test_fill_interleaved_bypassed_chain() {
        let mut state = ParameterState::new();
        for kind in EffectKind::ALL {
            state.set_bypass(kind, true);
        }
        let config = LiveConfig::default().with_sample_rate(8000);
        let (mut chain, mut processor) = live_engine(config, ChainOrder::default(), state).unwrap();
        chain.load(source(1000, 8000)).unwrap();
        chain.play().unwrap();

        let mut out = vec![1.0f32; 200 * 3];
        processor.fill_interleaved(&mut out, 3);
        assert!(out.chunks(3).all(|f| f == [0.25f32, 0.25, 0.0]));

        let mut mono = vec![1.0f32; 900];
        processor.fill_interleaved(&mut mono, 1);
        assert!(mono[..800].iter().all(|&s| s == 0.25));
        assert!(mono[800..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_analysis_tap_reports_level() {
        let (mut chain, mut processor) = engine(8000);
        assert_eq!(chain.analysis().level_db, METER_FLOOR_DB);
        chain.load(source(8000, 8000)).unwrap();
        chain.play().unwrap();
        for _ in 0..20 {
            processor.render_quantum();
        }
        let snapshot = chain.analysis();
        assert!(snapshot.level_db > METER_FLOOR_DB);
        assert_eq!(snapshot.spectrum.len(), DEFAULT_FFT_SIZE / 2);
    }
}
