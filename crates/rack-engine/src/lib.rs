//! rack-engine: Processing graph and signal-chain engine
//!
//! Provides:
//! - An explicit processing context (node arena + edges + timeline)
//! - Effect units built identically for live and offline contexts
//! - Chain routing that fully replaces previous wiring on every reorder
//! - Immediate and smoothed parameter automation
//! - A live engine split into control and real-time halves (lock-free)

// Audio engine uses explicit indexing for per-frame loops
#![allow(clippy::needless_range_loop)]

// Core modules
mod context;
mod node;

// Effect units
pub mod dsp_wrappers;
mod factory;

// Chain
mod automation;
mod graph;
mod router;

// Live playback
pub mod live;

pub use automation::*;
pub use context::*;
pub use factory::*;
pub use graph::*;
pub use live::{AnalysisSnapshot, ControlMessage, LiveChain, LiveConfig, LiveProcessor, LiveShared, RoutePlan, live_engine};
pub use node::*;
pub use router::*;
