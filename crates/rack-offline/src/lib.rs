//! rack-offline: Offline render pipeline
//!
//! Renders a decoded source through a disposable copy of the signal chain
//! and encodes the result as 16-bit PCM WAV.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────┐   ┌──────────┐   ┌──────────┐
//! │ Source   │ → │ Disposable EngineContext │ → │ WAV      │ → │ Atomic   │
//! │ Decoder  │   │ (units + router + state) │   │ Encoder  │   │ Write    │
//! └──────────┘   └──────────────────────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rack_offline::{RenderJob, load_source};
//!
//! let source = Arc::new(load_source(Path::new("take.flac"))?);
//! let file = RenderJob::new(source, &order, &params).run()?;
//! file.save_in(Path::new("exports"))?;
//! ```

mod config;
mod decoder;
mod error;
mod job;
pub mod wav;

pub use config::*;
pub use decoder::*;
pub use error::*;
pub use job::*;
