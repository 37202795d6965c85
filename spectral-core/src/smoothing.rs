//! # Temporal Smoothing Module
//!
//! Turns the jittery per-frame estimates into a stable live frequency:
//! outliers are rejected against the most recent accepted value, the bounded
//! history is averaged with linearly increasing weights (newest counts most),
//! and the average is passed through a one-pole low-pass filter.

use std::collections::VecDeque;
use tracing::debug;

use crate::config::SmoothingConfig;
use crate::error::FrameSkip;

/// Bounded history plus low-pass state for one analysis session.
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    config: SmoothingConfig,
    history: VecDeque<f32>,
    previous_smoothed: Option<f32>,
    consecutive_rejections: usize,
}

impl TemporalSmoother {
    pub fn new(config: SmoothingConfig) -> Self {
        let history = VecDeque::with_capacity(config.history_size);
        Self {
            config,
            history,
            previous_smoothed: None,
            consecutive_rejections: 0,
        }
    }

    /// Feeds one corrected frequency and returns the new smoothed value.
    ///
    /// A rejected frame leaves the history and filter untouched.
    ///
    /// # Arguments
    /// * `frequency` - Harmonic-corrected frequency of the current frame in Hz
    ///
    /// # Returns
    /// * `Ok(smoothed)` - Weighted history average passed through the low-pass filter
    /// * `Err(OutlierRejected)` - The jump from the newest history entry exceeds the threshold
    /// * `Err(NumericDegeneracy)` - `frequency` is not finite and positive
    pub fn push(&mut self, frequency: f32) -> Result<f32, FrameSkip> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(FrameSkip::NumericDegeneracy("frequency is not positive"));
        }

        if let Some(&most_recent) = self.history.back() {
            let jump_hz = (frequency - most_recent).abs();
            if jump_hz > self.config.jump_threshold_hz {
                if !self.should_relock() {
                    return Err(FrameSkip::OutlierRejected {
                        jump_hz,
                        threshold_hz: self.config.jump_threshold_hz,
                    });
                }
                debug!(from = most_recent, to = frequency, "smoother re-locking onto new pitch");
                self.reset();
            }
        }
        self.consecutive_rejections = 0;

        self.history.push_back(frequency);
        while self.history.len() > self.config.history_size {
            self.history.pop_front();
        }

        let average = self.weighted_average();
        let alpha = self.config.alpha;
        let smoothed = match self.previous_smoothed {
            Some(previous) => previous * (1.0 - alpha) + average * alpha,
            None => average,
        };
        self.previous_smoothed = Some(smoothed);
        Ok(smoothed)
    }

    /// Counts a rejection and reports whether the re-lock limit was reached.
    fn should_relock(&mut self) -> bool {
        match self.config.relock_after {
            Some(limit) => {
                self.consecutive_rejections += 1;
                self.consecutive_rejections >= limit
            }
            None => false,
        }
    }

    /// Weighted mean with weights 1 (oldest) through `len` (newest).
    fn weighted_average(&self) -> f32 {
        let (sum, weights) = self
            .history
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(sum, weights), (i, &f)| {
                let w = (i + 1) as f32;
                (sum + f * w, weights + w)
            });
        sum / weights
    }

    /// Most recent smoothed output, if any frame has been accepted.
    pub fn current(&self) -> Option<f32> {
        self.previous_smoothed
    }

    pub fn history(&self) -> &VecDeque<f32> {
        &self.history
    }

    /// Clears the history and the filter state.
    pub fn reset(&mut self) {
        self.history.clear();
        self.previous_smoothed = None;
        self.consecutive_rejections = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn smoother() -> TemporalSmoother {
        TemporalSmoother::new(SmoothingConfig::default())
    }

    #[test]
    fn first_value_passes_straight_through() {
        let mut s = smoother();
        assert_eq!(s.push(440.0), Ok(440.0));
        assert_eq!(s.current(), Some(440.0));
    }

    #[test]
    fn history_is_bounded() {
        let mut s = smoother();
        for i in 0..25 {
            s.push(200.0 + i as f32).unwrap();
            assert!(s.history().len() <= 10);
        }
        assert_eq!(s.history().len(), 10);
        assert_eq!(s.history().front(), Some(&215.0));
        assert_eq!(s.history().back(), Some(&224.0));
    }

    #[test]
    fn weights_favour_recent_values() {
        let config = SmoothingConfig { alpha: 1.0, ..Default::default() };
        let mut s = TemporalSmoother::new(config);
        s.push(100.0).unwrap();
        // (100 * 1 + 130 * 2) / 3
        assert_abs_diff_eq!(s.push(130.0).unwrap(), 120.0, epsilon = 1e-4);
    }

    #[test]
    fn large_jump_is_rejected_without_state_change() {
        let mut s = smoother();
        s.push(440.0).unwrap();
        s.push(442.0).unwrap();
        let before = s.clone();

        let result = s.push(880.0);
        assert!(matches!(result, Err(FrameSkip::OutlierRejected { .. })));
        assert_eq!(s.history(), before.history());
        assert_eq!(s.current(), before.current());
    }

    #[test]
    fn non_positive_input_is_degenerate() {
        let mut s = smoother();
        assert!(matches!(s.push(0.0), Err(FrameSkip::NumericDegeneracy(_))));
        assert!(matches!(s.push(f32::NAN), Err(FrameSkip::NumericDegeneracy(_))));
        assert_eq!(s.current(), None);
    }

    #[test]
    fn constant_input_converges() {
        let mut s = smoother();
        s.push(440.0).unwrap();
        let mut last = 0.0;
        // Well past 1 / alpha frames.
        for _ in 0..200 {
            last = s.push(450.0).unwrap();
        }
        assert_abs_diff_eq!(last, 450.0, epsilon = 0.01);
    }

    #[test]
    fn single_spike_is_bounded_by_alpha() {
        let config = SmoothingConfig::default();
        let alpha = config.alpha;
        let mut s = TemporalSmoother::new(config);
        let mut steady = 0.0;
        for _ in 0..100 {
            steady = s.push(440.0).unwrap();
        }

        let spike = 470.0;
        let after_spike = s.push(spike).unwrap();
        assert!((after_spike - steady).abs() <= alpha * (spike - steady).abs() + 1e-3);

        let mut previous_error = (after_spike - 440.0).abs();
        // Once the spike leaves the history the error decays monotonically.
        for i in 0..60 {
            let value = s.push(440.0).unwrap();
            let error = (value - 440.0).abs();
            if i >= 10 {
                assert!(error <= previous_error + 1e-4);
            }
            previous_error = error;
        }
        assert!(previous_error < 0.1);
    }

    #[test]
    fn relock_accepts_a_sustained_new_pitch() {
        let config = SmoothingConfig { relock_after: Some(3), ..Default::default() };
        let mut s = TemporalSmoother::new(config);
        s.push(110.0).unwrap();

        assert!(s.push(220.0).is_err());
        assert!(s.push(220.0).is_err());
        assert_eq!(s.push(220.0), Ok(220.0));
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn without_relock_the_smoother_stays_locked() {
        let mut s = smoother();
        s.push(110.0).unwrap();
        for _ in 0..50 {
            assert!(s.push(220.0).is_err());
        }
        assert_eq!(s.current(), Some(110.0));
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = smoother();
        s.push(440.0).unwrap();
        s.reset();
        assert!(s.history().is_empty());
        assert_eq!(s.current(), None);
        assert_eq!(s.push(100.0), Ok(100.0));
    }
}
