//! Energy-based voice activity classification.
//!
//! Classifies a block of samples as speech or silence by comparing its RMS
//! level to a threshold. The pause timing on top of this lives in the
//! utterance segmenter.

use crate::defaults;

/// RMS threshold classifier for blocks of 16-bit PCM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyVad {
    threshold: f32,
}

impl EnergyVad {
    /// Creates a classifier with the given RMS threshold (0.0 to 1.0).
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Returns true if the block's level is above the threshold.
    pub fn is_speech(&self, samples: &[i16]) -> bool {
        calculate_rms(samples) > self.threshold
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(defaults::SPEECH_THRESHOLD)
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Arguments
/// * `samples` - Audio samples as 16-bit PCM
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}
