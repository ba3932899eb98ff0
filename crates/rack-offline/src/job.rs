//! Offline render job
//!
//! One job owns one disposable processing context. It walks
//! `Idle -> Building -> Rendering -> Encoding -> Done`, dropping to `Failed`
//! on any error; no bytes exist unless the render finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rack_core::{AudioBuffer, CHANNELS, ChainOrder, ParameterState};
use rack_engine::{ChainGraph, ContextKind, EngineContext};
use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;
use crate::error::{OfflineError, OfflineResult};
use crate::wav;

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Render job execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderState {
    #[default]
    Idle,
    Building,
    Rendering,
    Encoding,
    Done,
    Failed,
}

impl RenderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderState::Done | RenderState::Failed)
    }
}

type StateListener = Box<dyn FnMut(RenderState) + Send>;

// ═══════════════════════════════════════════════════════════════════════════════
// RENDERED FILE
// ═══════════════════════════════════════════════════════════════════════════════

/// Output of a successful job
#[derive(Debug, Clone)]
pub struct RenderedFile {
    /// Complete WAV file image
    pub bytes: Vec<u8>,
    /// Rendered audio before quantisation
    pub buffer: AudioBuffer,
    /// Default export name, `<prefix>_<unix millis>.wav`
    pub suggested_name: String,
}

impl RenderedFile {
    /// Write to `path` atomically
    pub fn write_to(&self, path: &Path) -> OfflineResult<()> {
        wav::write_atomic(path, &self.bytes)
    }

    /// Write into `dir` under the suggested name
    pub fn save_in(&self, dir: &Path) -> OfflineResult<PathBuf> {
        let path = dir.join(&self.suggested_name);
        self.write_to(&path)?;
        Ok(path)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER JOB
// ═══════════════════════════════════════════════════════════════════════════════

/// Renders a source through a snapshot of the chain
pub struct RenderJob {
    source: Arc<AudioBuffer>,
    order: ChainOrder,
    params: ParameterState,
    config: RenderConfig,
    state: RenderState,
    listener: Option<StateListener>,
}

impl RenderJob {
    /// Snapshot `order` and `params`; later edits do not affect the job
    pub fn new(source: Arc<AudioBuffer>, order: &ChainOrder, params: &ParameterState) -> Self {
        Self {
            source,
            order: order.clone(),
            params: params.clone(),
            config: RenderConfig::default(),
            state: RenderState::Idle,
            listener: None,
        }
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Called on every state transition
    pub fn on_state_change(mut self, listener: impl FnMut(RenderState) + Send + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Run to completion
    pub fn run(mut self) -> OfflineResult<RenderedFile> {
        match self.execute() {
            Ok(file) => {
                self.set_state(RenderState::Done);
                log::info!("render done: {} bytes", file.bytes.len());
                Ok(file)
            }
            Err(e) => {
                self.set_state(RenderState::Failed);
                log::error!("render failed: {e}");
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> OfflineResult<RenderedFile> {
        // Step 1: Build a disposable context and graph
        self.set_state(RenderState::Building);
        self.config.validate()?;
        let frames = self.validate_source()?;

        let source = Arc::new(self.source.to_stereo());
        let mut ctx = EngineContext::new(ContextKind::Offline, source.sample_rate());
        let graph = ChainGraph::build(&mut ctx, &self.order, &self.params);
        if !graph.start_source(&mut ctx, source, 0) {
            return Err(OfflineError::RenderFailed("source node unavailable".into()));
        }

        // Step 2: Render the whole source
        self.set_state(RenderState::Rendering);
        let rendered = ctx
            .render(frames)
            .map_err(|e| OfflineError::RenderFailed(e.to_string()))?;
        debug_assert_eq!(rendered.num_channels(), CHANNELS);

        // Step 3: Encode
        self.set_state(RenderState::Encoding);
        let bytes = wav::encode(&rendered, frames)?;

        Ok(RenderedFile {
            bytes,
            buffer: rendered,
            suggested_name: self.config.suggested_file_name(),
        })
    }

    fn validate_source(&self) -> OfflineResult<usize> {
        let source = &self.source;
        let frames = source.frames();
        if source.num_channels() == 0 || frames == 0 {
            return Err(OfflineError::InvalidSource("source has no audio".into()));
        }
        if !self.config.accepts_sample_rate(source.sample_rate()) {
            return Err(OfflineError::InvalidSource(format!(
                "sample rate {} Hz outside {}..={} Hz",
                source.sample_rate(),
                self.config.min_sample_rate,
                self.config.max_sample_rate
            )));
        }
        if source.has_non_finite() {
            return Err(OfflineError::InvalidSource("source contains NaN or infinite samples".into()));
        }
        if frames > self.config.max_frames {
            return Err(OfflineError::RenderFailed(format!(
                "{frames} frames exceed the render limit of {}",
                self.config.max_frames
            )));
        }
        Ok(frames)
    }

    fn set_state(&mut self, state: RenderState) {
        log::debug!("render job: {:?} -> {:?}", self.state, state);
        self.state = state;
        if let Some(listener) = self.listener.as_mut() {
            listener(state);
        }
    }
}
