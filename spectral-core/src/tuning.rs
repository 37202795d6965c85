//! # Musical Tuning Module
//!
//! Maps a frequency to the closest note of an equal-temperament table and
//! judges how far off it is in cents.
//!
//! ## Features
//! - 88-key piano note table (A0 to C8, A4 = 440 Hz), built once
//! - Custom tables and reference pitches via [`NoteTable`]
//! - Cent deviation and its inverse
//! - Four-level tuning classification with sharp/flat direction
//! - Optional unweighted moving average for display readouts
//!
//! The closest note is chosen by absolute distance in Hz, not in cents. Near
//! the midpoint between two notes this can pick the upper neighbour even when
//! the lower one is closer in pitch; the error is at most a few cents and only
//! matters right at that boundary.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::config::TuningThresholds;

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Reference frequency in Hz
    pub frequency: f32,
}

const NOTE_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Index of A4 in the 88-key table.
const A4_KEY_INDEX: usize = 48;

/// An immutable list of notes to match frequencies against.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteTable {
    notes: Vec<Note>,
}

impl NoteTable {
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    /// The 88 piano keys in equal temperament around the given A4 pitch.
    pub fn equal_temperament(a4: f32) -> Self {
        let notes = (0..88)
            .map(|i| {
                // f = A4 * 2^(n/12), n semitones away from A4.
                let frequency = a4 * 2.0_f32.powf((i as f32 - A4_KEY_INDEX as f32) / 12.0);
                // Names cycle every 12 keys from A; the octave number changes at C.
                let octave = (i + 9) / 12;
                Note {
                    name: format!("{}{}", NOTE_NAMES[i % 12], octave),
                    frequency,
                }
            })
            .collect();
        Self { notes }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Finds the note with the smallest absolute distance in Hz.
    pub fn find_nearest(&self, freq: f32) -> Option<&Note> {
        if !freq.is_finite() {
            return None;
        }
        self.notes.iter().min_by(|a, b| {
            let diff_a = (a.frequency - freq).abs();
            let diff_b = (b.frequency - freq).abs();
            diff_a.total_cmp(&diff_b)
        })
    }
}

/// Statically computed notes for a standard 88-key piano (A0 to C8).
pub static NOTES: Lazy<NoteTable> = Lazy::new(|| NoteTable::equal_temperament(440.0));

/// Static map for note name to key index lookups.
static NOTE_MAP: Lazy<BTreeMap<String, usize>> = Lazy::new(|| {
    NOTES
        .notes()
        .iter()
        .enumerate()
        .map(|(i, note)| (note.name.clone(), i))
        .collect()
});

/// Gets the 88-key piano index from a note name such as "A4" or "C#3".
pub fn key_index_from_name(name: &str) -> Option<usize> {
    NOTE_MAP.get(name).copied()
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat. Only meaningful for
/// positive frequencies.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Inverse of [`calculate_cents_deviation`].
pub fn frequency_from_cents(target_freq: f32, cents: f32) -> f32 {
    target_freq * 2.0_f32.powf(cents / 1200.0)
}

/// Which side of the reference a frequency lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deviation {
    Sharp,
    Flat,
}

/// Coarse classification of a cent deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningState {
    InTune,
    NearlyInTune,
    SlightlyOff(Deviation),
    FarOff(Deviation),
}

impl TuningState {
    pub fn classify(cents: f32, thresholds: &TuningThresholds) -> Self {
        let magnitude = cents.abs();
        let direction = if cents > 0.0 { Deviation::Sharp } else { Deviation::Flat };
        if magnitude < thresholds.in_tune_cents {
            TuningState::InTune
        } else if magnitude < thresholds.nearly_in_tune_cents {
            TuningState::NearlyInTune
        } else if magnitude < thresholds.slightly_off_cents {
            TuningState::SlightlyOff(direction)
        } else {
            TuningState::FarOff(direction)
        }
    }
}

impl fmt::Display for TuningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuningState::InTune => write!(f, "in tune"),
            TuningState::NearlyInTune => write!(f, "nearly in tune"),
            TuningState::SlightlyOff(Deviation::Sharp) => write!(f, "slightly sharp"),
            TuningState::SlightlyOff(Deviation::Flat) => write!(f, "slightly flat"),
            TuningState::FarOff(Deviation::Sharp) => write!(f, "far off (sharp)"),
            TuningState::FarOff(Deviation::Flat) => write!(f, "far off (flat)"),
        }
    }
}

/// Closest note, cent offset and classification for one frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub frequency: f32,
    pub closest_note: Note,
    pub cents_offset: f32,
    pub state: TuningState,
}

/// Maps `freq` onto the nearest note of `table` and judges its tuning.
///
/// # Arguments
/// * `freq` - Frequency to judge in Hz
/// * `table` - Notes to match against
/// * `thresholds` - Cent limits of the tuning states
///
/// # Returns
/// * `Some(TuningResult)` - Closest note, signed cent offset and tuning state
/// * `None` - `freq` is non-positive or non-finite, or `table` is empty
pub fn map_frequency(
    freq: f32,
    table: &NoteTable,
    thresholds: &TuningThresholds,
) -> Option<TuningResult> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    let note = table.find_nearest(freq)?;
    let cents_offset = calculate_cents_deviation(freq, note.frequency);
    Some(TuningResult {
        frequency: freq,
        closest_note: note.clone(),
        cents_offset,
        state: TuningState::classify(cents_offset, thresholds),
    })
}

/// Unweighted moving average over the last `window` readings.
///
/// Meant for smoothing a displayed readout only; the analysis pipeline
/// already smooths its output.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    buffer: VecDeque<f32>,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            buffer: VecDeque::with_capacity(window.max(1)),
        }
    }

    pub fn push(&mut self, value: f32) -> f32 {
        self.buffer.push_back(value);
        if self.buffer.len() > self.window {
            self.buffer.pop_front();
        }
        self.buffer.iter().sum::<f32>() / self.buffer.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rstest::rstest;

    fn thresholds() -> TuningThresholds {
        TuningThresholds::default()
    }

    #[test]
    fn table_spans_a0_to_c8() {
        let notes = NOTES.notes();
        assert_eq!(notes.len(), 88);
        assert_eq!(notes[0].name, "A0");
        assert_abs_diff_eq!(notes[0].frequency, 27.5, epsilon = 1e-3);
        assert_eq!(notes[87].name, "C8");
        assert_abs_diff_eq!(notes[87].frequency, 4186.01, epsilon = 0.05);
        assert_eq!(notes[A4_KEY_INDEX].name, "A4");
        assert_eq!(notes[A4_KEY_INDEX].frequency, 440.0);
    }

    #[test]
    fn name_lookup() {
        assert_eq!(key_index_from_name("A4"), Some(48));
        assert_eq!(key_index_from_name("C4"), Some(39));
        assert_eq!(key_index_from_name("H2"), None);
    }

    #[test]
    fn a440_is_in_tune() {
        let result = map_frequency(440.0, &NOTES, &thresholds()).unwrap();
        assert_eq!(result.closest_note.name, "A4");
        assert_abs_diff_eq!(result.cents_offset, 0.0, epsilon = 1e-4);
        assert_eq!(result.state, TuningState::InTune);
        assert_eq!(result.state.to_string(), "in tune");
    }

    #[test]
    fn semitone_above_sparse_reference_is_far_off_sharp() {
        let table = NoteTable::new(vec![
            Note { name: "A3".into(), frequency: 220.0 },
            Note { name: "E4".into(), frequency: 329.63 },
        ]);
        let result = map_frequency(233.0, &table, &thresholds()).unwrap();
        assert_eq!(result.closest_note.name, "A3");
        assert_abs_diff_eq!(result.cents_offset, 99.4, epsilon = 0.5);
        assert_eq!(result.state, TuningState::FarOff(Deviation::Sharp));
    }

    #[rstest]
    #[case(3.0, TuningState::InTune)]
    #[case(-4.9, TuningState::InTune)]
    #[case(5.0, TuningState::NearlyInTune)]
    #[case(-14.0, TuningState::NearlyInTune)]
    #[case(20.0, TuningState::SlightlyOff(Deviation::Sharp))]
    #[case(-29.9, TuningState::SlightlyOff(Deviation::Flat))]
    #[case(30.0, TuningState::FarOff(Deviation::Sharp))]
    #[case(-45.0, TuningState::FarOff(Deviation::Flat))]
    fn classification_boundaries(#[case] cents: f32, #[case] expected: TuningState) {
        assert_eq!(TuningState::classify(cents, &thresholds()), expected);
    }

    #[test]
    fn cents_round_trip() {
        for freq in [27.5_f32, 82.4, 233.0, 440.0, 1234.5, 4000.0] {
            let result = map_frequency(freq, &NOTES, &thresholds()).unwrap();
            let rebuilt = frequency_from_cents(result.closest_note.frequency, result.cents_offset);
            assert_relative_eq!(rebuilt, freq, max_relative = 1e-5);
        }
    }

    #[test]
    fn mapping_is_idempotent() {
        let first = map_frequency(196.5, &NOTES, &thresholds());
        let second = map_frequency(196.5, &NOTES, &thresholds());
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_inputs_have_no_result() {
        assert_eq!(map_frequency(0.0, &NOTES, &thresholds()), None);
        assert_eq!(map_frequency(-10.0, &NOTES, &thresholds()), None);
        assert_eq!(map_frequency(f32::NAN, &NOTES, &thresholds()), None);
        assert_eq!(map_frequency(440.0, &NoteTable::new(vec![]), &thresholds()), None);
    }

    #[test]
    fn moving_average_uses_last_window_values() {
        let mut avg = MovingAverage::new(5);
        assert_eq!(avg.push(10.0), 10.0);
        for v in [20.0, 30.0, 40.0, 50.0] {
            avg.push(v);
        }
        // Window is now 20..=60.
        assert_abs_diff_eq!(avg.push(60.0), 40.0);
    }
}
