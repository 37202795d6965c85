//! # Fast Fourier Transform (FFT) Module
//!
//! Produces byte magnitude spectra from blocks of time-domain samples, the
//! same shape of data a browser analyser node hands out: `fft_size / 2` bins,
//! each a decibel level mapped linearly onto 0..=255.
//!
//! ## Processing chain
//! - DC offset removal
//! - Blackman window
//! - Forward FFT (RustFFT), magnitude scaled by `1 / fft_size`
//! - Per-bin temporal smoothing against the previous block
//! - Conversion to dB and mapping of `[min_db, max_db]` onto `[0, 255]`

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::f32::consts::PI;
use std::sync::Arc;

pub const DEFAULT_MIN_DB: f32 = -100.0;
pub const DEFAULT_MAX_DB: f32 = -30.0;
pub const DEFAULT_SMOOTHING_TIME_CONSTANT: f32 = 0.8;

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Blackman window coefficients (alpha = 0.16) for `n` samples.
fn blackman_window(n: usize) -> Vec<f32> {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

/// Stateful byte-spectrum analyser for a fixed FFT size.
pub struct SpectrumAnalyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    min_db: f32,
    max_db: f32,
    smoothing_time_constant: f32,
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("min_db", &self.min_db)
            .field("max_db", &self.max_db)
            .field("smoothing_time_constant", &self.smoothing_time_constant)
            .finish()
    }
}

impl SpectrumAnalyser {
    /// Plans an FFT of `fft_size` points with the default dB range and smoothing.
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self {
            fft_size,
            fft,
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex { re: 0.0, im: 0.0 }; fft_size],
            min_db: DEFAULT_MIN_DB,
            max_db: DEFAULT_MAX_DB,
            smoothing_time_constant: DEFAULT_SMOOTHING_TIME_CONSTANT,
        }
    }

    /// Sets the per-bin smoothing against the previous block (0 disables it).
    pub fn with_smoothing(mut self, time_constant: f32) -> Self {
        self.smoothing_time_constant = time_constant.clamp(0.0, 1.0);
        self
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Analyses one block of exactly `fft_size` samples into `out`
    /// (`fft_size / 2` bytes).
    ///
    /// Blocks of the wrong length are zero-padded or truncated.
    ///
    /// # Arguments
    /// * `signal` - Time-domain samples, newest last
    /// * `out` - Receives one byte per bin below Nyquist
    pub fn analyse_into(&mut self, signal: &[f32], out: &mut [u8]) {
        let n = self.fft_size;
        let mut block: Vec<f32> = signal.iter().copied().take(n).collect();
        block.resize(n, 0.0);
        remove_dc_offset(&mut block);

        for ((slot, sample), w) in self.scratch.iter_mut().zip(&block).zip(&self.window) {
            *slot = Complex { re: sample * w, im: 0.0 };
        }
        self.fft.process(&mut self.scratch);

        let tau = self.smoothing_time_constant;
        let scale = 255.0 / (self.max_db - self.min_db);
        for ((bin, previous), byte) in self
            .scratch
            .iter()
            .take(n / 2)
            .zip(self.smoothed.iter_mut())
            .zip(out.iter_mut())
        {
            let magnitude = bin.norm() / n as f32;
            *previous = tau * *previous + (1.0 - tau) * magnitude;
            let db = 20.0 * previous.log10();
            *byte = if db.is_finite() {
                (scale * (db - self.min_db)).floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }

    /// Convenience wrapper around [`Self::analyse_into`] that allocates the output.
    pub fn analyse(&mut self, signal: &[f32]) -> Vec<u8> {
        let mut out = vec![0u8; self.fft_size / 2];
        self.analyse_into(signal, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn window_tapers_to_zero_at_start() {
        let w = blackman_window(1024);
        assert!(w[0].abs() < 1e-6);
        assert!((w[512] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let mut analyser = SpectrumAnalyser::new(1024).with_smoothing(0.0);
        // Exactly bin 40 at 44.1 kHz / 1024.
        let freq = 40.0 * 44_100.0 / 1024.0;
        let spectrum = analyser.analyse(&sine(freq, 44_100.0, 1024, 0.01));
        assert_eq!(spectrum.len(), 512);

        let (max_index, _) = spectrum
            .iter()
            .enumerate()
            .skip(1)
            .max_by_key(|&(_, v)| *v)
            .unwrap();
        assert_eq!(max_index, 40);
        assert!(spectrum[40] > 150);
        assert!(spectrum[39] < spectrum[40] && spectrum[41] < spectrum[40]);
    }

    #[test]
    fn silence_maps_to_zero() {
        let mut analyser = SpectrumAnalyser::new(256);
        let spectrum = analyser.analyse(&vec![0.0; 256]);
        assert!(spectrum.iter().all(|&v| v == 0));
    }

    #[test]
    fn smoothing_lags_behind_a_sudden_onset() {
        let signal = sine(1000.0, 44_100.0, 1024, 0.01);
        let mut smoothed = SpectrumAnalyser::new(1024);
        let mut instant = SpectrumAnalyser::new(1024).with_smoothing(0.0);
        let bin = (1000.0_f32 * 1024.0 / 44_100.0).round() as usize;
        assert!(smoothed.analyse(&signal)[bin] < instant.analyse(&signal)[bin]);
    }
}
