// spectral-core/src/lib.rs

//! The core logic for the spectral instrument tuner.
//! This crate turns a stream of byte magnitude spectra into a stable live
//! frequency, a per-session averaged spectrum with a modal frequency, and a
//! nearest-note tuning judgment. It is completely headless and performs no
//! audio I/O; spectra come in through [`source::SpectrumSource`].

pub mod config;
pub mod error;
pub mod fft;
pub mod harmonic;
pub mod peak;
pub mod pipeline;
pub mod session;
pub mod smoothing;
pub mod source;
pub mod tuning;

pub use config::AnalyzerConfig;
pub use error::{ConfigError, FrameSkip, PipelineError};
pub use pipeline::{Pipeline, SessionState, TickOutcome};
pub use session::SessionSummary;
pub use source::{AnalyserSource, SpectrumSource};
pub use tuning::{TuningResult, TuningState};
