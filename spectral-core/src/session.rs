//! # Session Aggregation Module
//!
//! Accumulates spectra and frequency observations for the duration of one
//! recording session and reduces them to a time-averaged spectrum and a
//! modal frequency when the session stops.
//!
//! The mode is used instead of the mean or median because attack transients
//! and noise bias the arithmetic mean, while the sustained pitch dominates
//! the count. Ties go to the lowest frequency.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound of a byte magnitude.
const MAX_MAGNITUDE: f32 = 255.0;

/// The finalized result of a recording session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Modal frequency rounded to whole Hz, `None` when nothing was observed.
    pub frequency: Option<f32>,
    /// Per-bin mean magnitude, empty when nothing was observed.
    pub spectrum: Vec<f32>,
    /// Number of frames that contributed.
    pub frame_count: usize,
}

/// Running per-bin sums and frequency observations.
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    sums: Vec<f64>,
    frame_count: usize,
    observations: Vec<f32>,
}

impl SessionAggregator {
    pub fn new(bin_count: usize) -> Self {
        Self {
            sums: vec![0.0; bin_count],
            frame_count: 0,
            observations: Vec::new(),
        }
    }

    /// Zeroes the sums, the frame count and the observation list.
    pub fn start(&mut self, bin_count: usize) {
        self.sums.clear();
        self.sums.resize(bin_count, 0.0);
        self.frame_count = 0;
        self.observations.clear();
    }

    /// Adds one frame and the corrected frequency observed in it.
    ///
    /// The frame is copied into the running sums; bins beyond the configured
    /// count are ignored.
    pub fn accumulate(&mut self, frame: &[u8], frequency: f32) {
        for (sum, &magnitude) in self.sums.iter_mut().zip(frame) {
            *sum += magnitude as f64;
        }
        self.frame_count += 1;
        self.observations.push(frequency);
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn observations(&self) -> &[f32] {
        &self.observations
    }

    /// Reduces the session to its averaged spectrum and modal frequency.
    ///
    /// # Returns
    /// A [`SessionSummary`] holding the per-bin mean magnitudes (capped at 255),
    /// the most frequent observation rounded to whole Hz and the frame count.
    /// A session without observations yields [`SessionSummary::default`]: no
    /// frequency and an empty spectrum.
    pub fn finalize(&self) -> SessionSummary {
        if self.observations.is_empty() || self.frame_count == 0 {
            return SessionSummary::default();
        }

        let count = self.frame_count as f64;
        let spectrum = self
            .sums
            .iter()
            .map(|&sum| ((sum / count) as f32).min(MAX_MAGNITUDE))
            .collect();

        SessionSummary {
            frequency: modal_frequency(&self.observations),
            spectrum,
            frame_count: self.frame_count,
        }
    }
}

/// Most frequent value after rounding to whole Hz; the lowest value wins ties.
pub fn modal_frequency(observations: &[f32]) -> Option<f32> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for &f in observations.iter().filter(|f| f.is_finite()) {
        *counts.entry(f.round() as i64).or_insert(0) += 1;
    }

    // BTreeMap iterates in ascending order, and only a strictly larger
    // count replaces the current best.
    let mut best: Option<(i64, usize)> = None;
    for (&hz, &count) in &counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((hz, count));
        }
    }
    best.map(|(hz, _)| hz as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn averages_two_frames() {
        let mut agg = SessionAggregator::new(2);
        agg.accumulate(&[10, 20], 100.0);
        agg.accumulate(&[30, 40], 100.0);
        let summary = agg.finalize();
        assert_eq!(summary.spectrum, vec![20.0, 30.0]);
        assert_eq!(summary.frame_count, 2);
    }

    #[test]
    fn saturated_bins_stay_at_255() {
        let mut agg = SessionAggregator::new(1);
        for _ in 0..1000 {
            agg.accumulate(&[255], 50.0);
        }
        assert_eq!(agg.finalize().spectrum, vec![255.0]);
    }

    #[test]
    fn empty_session_is_unknown() {
        let agg = SessionAggregator::new(512);
        let summary = agg.finalize();
        assert_eq!(summary.frequency, None);
        assert!(summary.spectrum.is_empty());
        assert_eq!(summary.frame_count, 0);
    }

    #[rstest]
    #[case(&[100.0, 100.0, 101.0, 100.0, 250.0], Some(100.0))]
    #[case(&[99.6, 100.4, 100.2, 250.0], Some(100.0))]
    #[case(&[220.0, 110.0, 220.0, 110.0], Some(110.0))]
    #[case(&[330.0, 440.0], Some(330.0))]
    #[case(&[], None)]
    fn mode_of_rounded_observations(#[case] observations: &[f32], #[case] expected: Option<f32>) {
        assert_eq!(modal_frequency(observations), expected);
    }

    #[test]
    fn start_discards_the_previous_session() {
        let mut agg = SessionAggregator::new(2);
        agg.accumulate(&[200, 200], 440.0);
        agg.start(4);
        assert_eq!(agg.frame_count(), 0);
        assert!(agg.observations().is_empty());

        agg.accumulate(&[4, 8, 12, 16], 82.0);
        let summary = agg.finalize();
        assert_eq!(summary.spectrum, vec![4.0, 8.0, 12.0, 16.0]);
        assert_eq!(summary.frequency, Some(82.0));
    }
}
