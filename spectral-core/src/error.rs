//! # Error Module
//!
//! Error taxonomy for the analysis pipeline.
//!
//! Per-frame conditions ([`FrameSkip`]) are never fatal: the frame is dropped,
//! no state is touched, and the caller keeps ticking. Only configuration
//! problems and mismatched spectrum sources surface as `Err`.

use thiserror::Error;

/// Reasons a single spectrum frame was dropped without touching any state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameSkip {
    /// The dominant bin sits on the spectrum boundary (or the frame is silent),
    /// so there are no neighbours to interpolate with.
    #[error("insufficient signal: peak at boundary bin {bin}")]
    InsufficientSignal { bin: usize },

    /// A computation produced a zero denominator, NaN, or a non-positive value.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(&'static str),

    /// The frequency jumped further than the configured threshold from the
    /// most recent accepted value.
    #[error("outlier rejected: jump of {jump_hz:.2} Hz exceeds {threshold_hz:.2} Hz")]
    OutlierRejected { jump_hz: f32, threshold_hz: f32 },

    /// The frame length does not match `fft_size / 2`.
    #[error("frame size mismatch: expected {expected} bins, got {actual}")]
    FrameSizeMismatch { expected: usize, actual: usize },
}

/// Invalid analyzer configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("fft size must be a power of two between 32 and 32768, got {0}")]
    InvalidFftSize(usize),

    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Errors returned by [`crate::pipeline::Pipeline`] outside the per-frame path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The spectrum source changed shape without an explicit reconfiguration.
    #[error(
        "spectrum source mismatch: source is {source_rate} Hz / fft {source_fft}, \
         pipeline is {pipeline_rate} Hz / fft {pipeline_fft}"
    )]
    SourceMismatch {
        source_rate: u32,
        source_fft: usize,
        pipeline_rate: u32,
        pipeline_fft: usize,
    },
}
