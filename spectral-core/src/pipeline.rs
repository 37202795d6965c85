//! # Analysis Pipeline Module
//!
//! Owns every piece of per-session state and runs one frame through the
//! whole chain per tick:
//!
//! 1. Peak extraction with parabolic interpolation
//! 2. Harmonic correction
//! 3. Session aggregation (spectrum sum and frequency observation)
//! 4. Temporal smoothing into the live frequency
//!
//! ## Lifecycle
//! The recording flag passed with each tick drives the session. A rising
//! edge resets all state and starts a session before that tick's frame is
//! processed; a falling edge finalizes the session exactly once. While not
//! recording, frames are ignored. Changing the transform shape is only
//! possible through [`Pipeline::reconfigure`].

use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;
use crate::error::{FrameSkip, PipelineError};
use crate::harmonic::correct_harmonics;
use crate::peak::extract_peak;
use crate::session::{SessionAggregator, SessionSummary};
use crate::smoothing::TemporalSmoother;
use crate::source::SpectrumSource;
use crate::tuning::{self, NoteTable, TuningResult};

/// Where the pipeline is in its session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been started since creation or reconfiguration.
    Idle,
    Recording,
    /// The last session was finalized; its summary is available.
    Finalized,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not recording; the frame was ignored.
    Idle,
    /// The frame produced a new live frequency.
    Live(f32),
    /// The frame was dropped; no smoothing state changed.
    Skipped(FrameSkip),
    /// Recording stopped on this tick and the session was finalized.
    Finalized(SessionSummary),
}

/// Per-frame intermediate values, useful for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAnalysis {
    pub raw_frequency: f32,
    pub corrected_frequency: f32,
    pub harmonic_divisor: Option<u32>,
}

/// One independent analysis pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AnalyzerConfig,
    table: NoteTable,
    smoother: TemporalSmoother,
    aggregator: SessionAggregator,
    state: SessionState,
    live_frequency: Option<f32>,
    summary: Option<SessionSummary>,
    last_analysis: Option<FrameAnalysis>,
}

impl Pipeline {
    /// Creates a pipeline matching against the standard 88-key table.
    pub fn new(config: AnalyzerConfig) -> Result<Self, PipelineError> {
        Self::with_table(config, (*tuning::NOTES).clone())
    }

    pub fn with_table(config: AnalyzerConfig, table: NoteTable) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            smoother: TemporalSmoother::new(config.smoothing.clone()),
            aggregator: SessionAggregator::new(config.bin_count()),
            table,
            config,
            state: SessionState::Idle,
            live_frequency: None,
            summary: None,
            last_analysis: None,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Replaces the configuration and atomically resets all dependent state.
    ///
    /// Any session in progress is discarded without being finalized and the
    /// pipeline returns to [`SessionState::Idle`]. On error nothing changes.
    pub fn reconfigure(&mut self, config: AnalyzerConfig) -> Result<(), PipelineError> {
        config.validate()?;
        info!(
            sample_rate = config.sample_rate,
            fft_size = config.fft_size,
            "pipeline reconfigured"
        );
        self.smoother = TemporalSmoother::new(config.smoothing.clone());
        self.aggregator = SessionAggregator::new(config.bin_count());
        self.config = config;
        self.state = SessionState::Idle;
        self.live_frequency = None;
        self.summary = None;
        self.last_analysis = None;
        Ok(())
    }

    /// Shorthand for reconfiguring only the transform size.
    pub fn set_fft_size(&mut self, fft_size: usize) -> Result<(), PipelineError> {
        let config = AnalyzerConfig { fft_size, ..self.config.clone() };
        self.reconfigure(config)
    }

    /// Processes one tick.
    ///
    /// `frame` is only borrowed; whatever must outlive the tick is copied.
    ///
    /// # Arguments
    /// * `frame` - Byte magnitude spectrum with `fft_size / 2` bins
    /// * `recording` - Current recording flag; its edges start and stop sessions
    ///
    /// # Returns
    /// * `Idle` - Not recording, the frame was ignored
    /// * `Live(f)` - The frame was analysed and `f` is the new live frequency
    /// * `Skipped(reason)` - The frame produced no live frequency
    /// * `Finalized(summary)` - Recording stopped and the session was reduced
    pub fn tick(&mut self, frame: &[u8], recording: bool) -> TickOutcome {
        let was_recording = self.state == SessionState::Recording;

        match (was_recording, recording) {
            (false, false) => return TickOutcome::Idle,
            (true, false) => return TickOutcome::Finalized(self.stop()),
            (false, true) => self.start(),
            (true, true) => {}
        }

        match self.process_frame(frame) {
            Ok(frequency) => {
                self.live_frequency = Some(frequency);
                TickOutcome::Live(frequency)
            }
            Err(reason) => {
                debug!(%reason, "frame skipped");
                TickOutcome::Skipped(reason)
            }
        }
    }

    /// Pulls one frame and the recording flag from `source` and ticks.
    ///
    /// Refuses sources whose sample rate or transform size differ from the
    /// configuration; use [`Self::reconfigure`] first.
    pub fn tick_source<S: SpectrumSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<TickOutcome, PipelineError> {
        if source.sample_rate() != self.config.sample_rate
            || source.fft_size() != self.config.fft_size
        {
            warn!(
                source_rate = source.sample_rate(),
                source_fft = source.fft_size(),
                "spectrum source does not match pipeline configuration"
            );
            return Err(PipelineError::SourceMismatch {
                source_rate: source.sample_rate(),
                source_fft: source.fft_size(),
                pipeline_rate: self.config.sample_rate,
                pipeline_fft: self.config.fft_size,
            });
        }
        let recording = source.is_recording();
        Ok(self.tick(source.magnitudes(), recording))
    }

    fn start(&mut self) {
        info!(fft_size = self.config.fft_size, "recording session started");
        self.smoother.reset();
        self.aggregator.start(self.config.bin_count());
        self.live_frequency = None;
        self.summary = None;
        self.last_analysis = None;
        self.state = SessionState::Recording;
    }

    fn stop(&mut self) -> SessionSummary {
        let summary = self.aggregator.finalize();
        info!(
            frames = summary.frame_count,
            frequency = ?summary.frequency,
            "recording session finalized"
        );
        self.summary = Some(summary.clone());
        self.state = SessionState::Finalized;
        summary
    }

    /// Runs extraction, correction, aggregation and smoothing for one frame.
    fn process_frame(&mut self, frame: &[u8]) -> Result<f32, FrameSkip> {
        let expected = self.config.bin_count();
        if frame.len() != expected {
            return Err(FrameSkip::FrameSizeMismatch { expected, actual: frame.len() });
        }

        let peak = extract_peak(frame, self.config.sample_rate, self.config.fft_size)?;
        let correction = correct_harmonics(&peak, frame, &self.config.harmonic);
        if !correction.frequency.is_finite() || correction.frequency <= 0.0 {
            return Err(FrameSkip::NumericDegeneracy("corrected frequency is not positive"));
        }
        self.last_analysis = Some(FrameAnalysis {
            raw_frequency: peak.raw_frequency,
            corrected_frequency: correction.frequency,
            harmonic_divisor: correction.divisor,
        });

        // Outlier frames still count towards the session; only the smoother drops them.
        self.aggregator.accumulate(frame, correction.frequency);
        self.smoother.push(correction.frequency)
    }

    /// Smoothed frequency of the current session, `None` until a frame is accepted.
    pub fn live_frequency(&self) -> Option<f32> {
        self.live_frequency
    }

    /// Intermediate values of the most recent analysed frame.
    pub fn last_analysis(&self) -> Option<FrameAnalysis> {
        self.last_analysis
    }

    /// Summary of the last finalized session.
    pub fn session_summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn final_frequency(&self) -> Option<f32> {
        self.summary.as_ref().and_then(|s| s.frequency)
    }

    /// Averaged spectrum of the last finalized session; empty if there is none.
    pub fn final_spectrum(&self) -> &[f32] {
        self.summary
            .as_ref()
            .map(|s| s.spectrum.as_slice())
            .unwrap_or(&[])
    }

    /// Frames accumulated so far in the current (or last) session.
    pub fn session_frame_count(&self) -> usize {
        self.aggregator.frame_count()
    }

    /// Tuning judgment for an arbitrary frequency against this pipeline's table.
    pub fn tuning_for(&self, frequency: f32) -> Option<TuningResult> {
        tuning::map_frequency(frequency, &self.table, &self.config.thresholds)
    }

    pub fn live_tuning(&self) -> Option<TuningResult> {
        self.live_frequency.and_then(|f| self.tuning_for(f))
    }

    pub fn final_tuning(&self) -> Option<TuningResult> {
        self.final_frequency().and_then(|f| self.tuning_for(f))
    }
}
