//! # Harmonic Correction Module
//!
//! Plucked strings are rich in overtones, and the loudest bin is often the
//! second or third partial rather than the fundamental. When a bin at an
//! integer sub-multiple of the detected peak carries enough energy, the true
//! fundamental is assumed to be lower and the frequency is divided down.
//!
//! Only division by an integer in the configured range (at most 2..=5) is
//! ever applied; the corrector never raises a frequency.

use crate::config::HarmonicConfig;
use crate::peak::PeakEstimate;

/// The outcome of harmonic disambiguation for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicCorrection {
    /// Frequency after correction; equals the raw frequency when nothing fired.
    pub frequency: f32,
    /// The divisor that fired, if any.
    pub divisor: Option<u32>,
}

impl HarmonicCorrection {
    fn unchanged(frequency: f32) -> Self {
        Self { frequency, divisor: None }
    }
}

/// Checks the sub-multiple bins of `peak` and divides its frequency by the
/// smallest divisor whose bin exceeds `ratio * peak magnitude`.
///
/// Candidate bins must be non-DC and strictly below the peak bin.
///
/// # Arguments
/// * `peak` - Peak estimate of the frame
/// * `frame` - The byte magnitude frame the peak was taken from
/// * `config` - Enable flag, magnitude ratio and divisor range
///
/// # Returns
/// The corrected frequency and the divisor that fired, or the raw frequency
/// unchanged when no candidate qualifies or correction is disabled.
pub fn correct_harmonics(
    peak: &PeakEstimate,
    frame: &[u8],
    config: &HarmonicConfig,
) -> HarmonicCorrection {
    if !config.enabled {
        return HarmonicCorrection::unchanged(peak.raw_frequency);
    }

    let threshold = config.ratio * peak.max_value as f32;

    for divisor in config.min_divisor..=config.max_divisor {
        let candidate = (peak.interpolated_index / divisor as f32).round() as usize;
        if candidate == 0 || candidate >= peak.max_index || candidate >= frame.len() {
            continue;
        }
        if frame[candidate] as f32 > threshold {
            return HarmonicCorrection {
                frequency: peak.raw_frequency / divisor as f32,
                divisor: Some(divisor),
            };
        }
    }

    HarmonicCorrection::unchanged(peak.raw_frequency)
}
