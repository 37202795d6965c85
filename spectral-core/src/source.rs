//! # Spectrum Source Module
//!
//! The seam between the pipeline and whatever produces spectra. A source
//! hands out one byte magnitude frame per tick together with the recording
//! flag; the frame buffer stays owned by the source and is only borrowed for
//! the duration of the tick.

use crate::fft::SpectrumAnalyser;

/// Supplies one frequency-magnitude frame per tick.
pub trait SpectrumSource {
    fn sample_rate(&self) -> u32;

    /// Transform size; frames hold `fft_size / 2` bins.
    fn fft_size(&self) -> usize;

    /// The latest magnitude frame, values 0..=255.
    fn magnitudes(&mut self) -> &[u8];

    fn is_recording(&self) -> bool;
}

/// A [`SpectrumSource`] fed with raw samples, analysed by a [`SpectrumAnalyser`].
///
/// Only the most recent `fft_size` samples are kept; older samples are
/// dropped rather than queued.
#[derive(Debug)]
pub struct AnalyserSource {
    analyser: SpectrumAnalyser,
    sample_rate: u32,
    samples: Vec<f32>,
    frame: Vec<u8>,
    dirty: bool,
    recording: bool,
}

impl AnalyserSource {
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self::with_analyser(sample_rate, SpectrumAnalyser::new(fft_size))
    }

    pub fn with_analyser(sample_rate: u32, analyser: SpectrumAnalyser) -> Self {
        let fft_size = analyser.fft_size();
        Self {
            analyser,
            sample_rate,
            samples: Vec::with_capacity(fft_size * 2),
            frame: vec![0; fft_size / 2],
            dirty: false,
            recording: false,
        }
    }

    /// Appends captured samples, keeping only the newest `fft_size`.
    pub fn push_samples(&mut self, data: &[f32]) {
        let fft_size = self.analyser.fft_size();
        self.samples.extend_from_slice(data);
        if self.samples.len() > fft_size {
            let excess = self.samples.len() - fft_size;
            self.samples.drain(..excess);
        }
        self.dirty = true;
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }
}

impl SpectrumSource for AnalyserSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn fft_size(&self) -> usize {
        self.analyser.fft_size()
    }

    fn magnitudes(&mut self) -> &[u8] {
        if self.dirty {
            self.analyser.analyse_into(&self.samples, &mut self.frame);
            self.dirty = false;
        }
        &self.frame
    }

    fn is_recording(&self) -> bool {
        self.recording
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_newest_block() {
        let mut source = AnalyserSource::new(44_100, 64);
        source.push_samples(&[1.0; 50]);
        source.push_samples(&[2.0; 50]);
        assert_eq!(source.samples.len(), 64);
        assert_eq!(source.samples[0], 1.0);
        assert_eq!(source.samples[13], 1.0);
        assert_eq!(source.samples[14], 2.0);
    }

    #[test]
    fn frame_has_half_fft_size_bins() {
        let mut source = AnalyserSource::new(48_000, 256);
        source.push_samples(&[0.0; 256]);
        assert_eq!(source.magnitudes().len(), 128);
        assert!(!source.is_recording());
        source.set_recording(true);
        assert!(source.is_recording());
    }
}
