//! # Configuration Module
//!
//! All tunable constants of the analysis pipeline live here as named fields
//! instead of literals. The defaults are the empirically chosen values for
//! plucked and bowed string instruments; every field can be overridden from a
//! JSON file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::ConfigError;

/// Smallest divisor the harmonic corrector may ever use.
pub const MIN_HARMONIC_DIVISOR: u32 = 2;
/// Largest divisor the harmonic corrector may ever use.
pub const MAX_HARMONIC_DIVISOR: u32 = 5;

/// Settings for octave/harmonic disambiguation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonicConfig {
    pub enabled: bool,
    /// A sub-multiple bin must exceed `ratio * peak` to count as the fundamental.
    pub ratio: f32,
    pub min_divisor: u32,
    pub max_divisor: u32,
}

impl Default for HarmonicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ratio: 0.6,
            min_divisor: MIN_HARMONIC_DIVISOR,
            max_divisor: MAX_HARMONIC_DIVISOR,
        }
    }
}

/// Settings for the temporal smoother.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Capacity of the frequency history.
    pub history_size: usize,
    /// Largest accepted jump (Hz) from the most recent accepted frequency.
    pub jump_threshold_hz: f32,
    /// Low-pass coefficient; higher follows the input faster.
    pub alpha: f32,
    /// Re-lock onto a new pitch after this many consecutive rejections.
    /// `None` keeps rejecting until the session is reset.
    pub relock_after: Option<usize>,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            history_size: 10,
            jump_threshold_hz: 40.0,
            alpha: 0.08,
            relock_after: None,
        }
    }
}

/// Cent boundaries used to classify a deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningThresholds {
    pub in_tune_cents: f32,
    pub nearly_in_tune_cents: f32,
    pub slightly_off_cents: f32,
}

impl Default for TuningThresholds {
    fn default() -> Self {
        Self {
            in_tune_cents: 5.0,
            nearly_in_tune_cents: 15.0,
            slightly_off_cents: 30.0,
        }
    }
}

/// Complete configuration of one [`crate::pipeline::Pipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub sample_rate: u32,
    pub fft_size: usize,
    pub harmonic: HarmonicConfig,
    pub smoothing: SmoothingConfig,
    pub thresholds: TuningThresholds,
    /// Window of the optional unweighted display average; 0 disables it.
    pub display_average_window: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            fft_size: 1024,
            harmonic: HarmonicConfig::default(),
            smoothing: SmoothingConfig::default(),
            thresholds: TuningThresholds::default(),
            display_average_window: 0,
        }
    }
}

impl AnalyzerConfig {
    /// Number of bins in each spectrum frame.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Width of one bin in Hz.
    pub fn bin_width_hz(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fft_size.is_power_of_two() || !(32..=32_768).contains(&self.fft_size) {
            return Err(ConfigError::InvalidFftSize(self.fft_size));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }

        let h = &self.harmonic;
        if !(h.ratio > 0.0 && h.ratio <= 1.0) {
            return Err(invalid("harmonic.ratio", format!("{} is outside (0, 1]", h.ratio)));
        }
        if h.min_divisor < MIN_HARMONIC_DIVISOR
            || h.max_divisor > MAX_HARMONIC_DIVISOR
            || h.min_divisor > h.max_divisor
        {
            return Err(invalid(
                "harmonic.divisors",
                format!(
                    "{}..={} must lie within {}..={}",
                    h.min_divisor, h.max_divisor, MIN_HARMONIC_DIVISOR, MAX_HARMONIC_DIVISOR
                ),
            ));
        }

        let s = &self.smoothing;
        if s.history_size == 0 {
            return Err(invalid("smoothing.history_size", "must be at least 1".into()));
        }
        if !(s.alpha > 0.0 && s.alpha <= 1.0) {
            return Err(invalid("smoothing.alpha", format!("{} is outside (0, 1]", s.alpha)));
        }
        if !(s.jump_threshold_hz.is_finite() && s.jump_threshold_hz > 0.0) {
            return Err(invalid(
                "smoothing.jump_threshold_hz",
                format!("{} must be positive", s.jump_threshold_hz),
            ));
        }
        if s.relock_after == Some(0) {
            return Err(invalid("smoothing.relock_after", "must be at least 1".into()));
        }

        let t = &self.thresholds;
        if !(t.in_tune_cents > 0.0
            && t.in_tune_cents < t.nearly_in_tune_cents
            && t.nearly_in_tune_cents < t.slightly_off_cents)
        {
            return Err(invalid(
                "thresholds",
                "must be positive and strictly increasing".into(),
            ));
        }
        Ok(())
    }

    /// Loads a configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .with_context(|| format!("opening config file {}", path.display()))?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let config: AnalyzerConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json_string = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)
            .with_context(|| format!("creating config file {}", path.display()))?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }
}

fn invalid(name: &'static str, reason: String) -> ConfigError {
    ConfigError::InvalidParameter { name, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.bin_count(), 512);
    }

    #[test]
    fn bin_width_follows_rate_and_size() {
        let config = AnalyzerConfig::default();
        assert!((config.bin_width_hz() - 43.066_406).abs() < 1e-4);

        let config = AnalyzerConfig { sample_rate: 48_000, fft_size: 2048, ..Default::default() };
        assert_eq!(config.bin_width_hz(), 23.4375);
    }

    #[test]
    fn rejects_non_power_of_two_fft() {
        let config = AnalyzerConfig { fft_size: 1000, ..Default::default() };
        assert_eq!(config.validate(), Err(ConfigError::InvalidFftSize(1000)));
    }

    #[test]
    fn rejects_divisor_outside_two_to_five() {
        let mut config = AnalyzerConfig::default();
        config.harmonic.max_divisor = 6;
        assert!(config.validate().is_err());

        config.harmonic.max_divisor = 5;
        config.harmonic.min_divisor = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_alpha_out_of_range() {
        let mut config = AnalyzerConfig::default();
        config.smoothing.alpha = 0.0;
        assert!(config.validate().is_err());
        config.smoothing.alpha = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AnalyzerConfig =
            serde_json::from_str(r#"{ "fft_size": 2048, "smoothing": { "alpha": 0.1 } }"#).unwrap();
        assert_eq!(config.fft_size, 2048);
        assert_eq!(config.smoothing.alpha, 0.1);
        assert_eq!(config.smoothing.history_size, 10);
        assert_eq!(config.harmonic, HarmonicConfig::default());
    }

    #[test]
    fn save_then_load_from_disk() {
        let path = std::env::temp_dir().join(format!("spectral-config-{}.json", std::process::id()));
        let mut config = AnalyzerConfig::default();
        config.smoothing.jump_threshold_hz = 35.0;
        config.save(&path).unwrap();

        let loaded = AnalyzerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }
}
