//! # Peak Extraction Module
//!
//! Locates the dominant bin of a byte magnitude spectrum and refines its
//! position with parabolic interpolation, giving sub-bin resolution finer
//! than `sample_rate / fft_size`.

use crate::error::FrameSkip;

/// The dominant peak of one spectrum frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakEstimate {
    /// Index of the strongest non-DC bin.
    pub max_index: usize,
    /// Magnitude at `max_index`.
    pub max_value: u8,
    /// `max_index` shifted by the parabolic offset, in bins.
    pub interpolated_index: f32,
    /// `interpolated_index` converted to Hz.
    pub raw_frequency: f32,
}

/// Finds the strongest bin of `frame` and interpolates its true position.
///
/// The DC bin is never a peak candidate. The first bin holding the maximum
/// wins ties, so a frame of all zeros reports its peak at bin 0.
///
/// # Arguments
/// * `frame` - Byte magnitudes, one per bin below Nyquist
/// * `sample_rate` - Sample rate of the analysed signal in Hz
/// * `fft_size` - Transform size the frame was computed with
///
/// # Returns
/// * `Ok(PeakEstimate)` - Peak bin, its magnitude and the refined position
/// * `Err(InsufficientSignal)` - The peak is at bin 0, at the last bin, or is
///   bin 1 sitting on the flank of a stronger DC bin
/// * `Err(NumericDegeneracy)` - The resulting frequency is not finite and positive
pub fn extract_peak(
    frame: &[u8],
    sample_rate: u32,
    fft_size: usize,
) -> Result<PeakEstimate, FrameSkip> {
    let mut max_index = 0;
    let mut max_value = 0u8;
    for (i, &value) in frame.iter().enumerate().skip(1) {
        if value > max_value {
            max_value = value;
            max_index = i;
        }
    }

    if max_index == 0 || max_index + 1 >= frame.len() {
        return Err(FrameSkip::InsufficientSignal { bin: max_index });
    }
    // Bin 1 below a louder DC bin is not a local maximum; the parabola through
    // it opens upward and its vertex can land anywhere.
    if max_index == 1 && frame[0] > max_value {
        return Err(FrameSkip::InsufficientSignal { bin: max_index });
    }

    let y0 = frame[max_index - 1] as f32;
    let y1 = frame[max_index] as f32;
    let y2 = frame[max_index + 1] as f32;

    let interpolated_index = max_index as f32 + parabolic_offset(y0, y1, y2);
    let raw_frequency = interpolated_index * sample_rate as f32 / fft_size as f32;

    if !raw_frequency.is_finite() || raw_frequency <= 0.0 {
        return Err(FrameSkip::NumericDegeneracy("peak frequency is not positive"));
    }

    Ok(PeakEstimate {
        max_index,
        max_value,
        interpolated_index,
        raw_frequency,
    })
}

/// Vertex offset of the parabola through three equally spaced points,
/// relative to the middle one.
fn parabolic_offset(y0: f32, y1: f32, y2: f32) -> f32 {
    let d = y0 - 2.0 * y1 + y2;
    if d != 0.0 { 0.5 * (y0 - y2) / d } else { 0.0 }
}
