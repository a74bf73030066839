//! Converts captured PCM into the waveform format the translator expects.
//!
//! Steps, in order: validate, decode `i16` to `f32` by full scale, down-mix
//! stereo to mono, resample to the fixed translator input rate.

use crate::audio::frame::{AudioFormat, Utterance, Waveform};
use crate::audio::resample::resample_mono;
use crate::defaults;
use crate::error::{Result, TalkGlobeError};

/// Normalizes utterance audio to mono `f32` at a fixed sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioNormalizer {
    target_rate: u32,
}

impl AudioNormalizer {
    /// Creates a normalizer producing waveforms at `target_rate` Hz.
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Normalizes a completed utterance.
    pub fn normalize(&self, utterance: &Utterance) -> Result<Waveform> {
        self.normalize_samples(&utterance.samples, utterance.format)
    }

    /// Normalizes interleaved PCM in the given format.
    pub fn normalize_samples(&self, samples: &[i16], format: AudioFormat) -> Result<Waveform> {
        validate(samples, format)?;

        let decoded = decode(samples);
        let mono = match format.channels {
            1 => decoded,
            _ => downmix_stereo(&decoded),
        };

        let resampled = resample_mono(&mono, format.sample_rate, self.target_rate)?;
        if resampled.is_empty() {
            return Err(TalkGlobeError::InvalidAudioInput {
                message: format!(
                    "{} samples at {}Hz are too short to resample to {}Hz",
                    mono.len(),
                    format.sample_rate,
                    self.target_rate
                ),
            });
        }

        Ok(Waveform::new(resampled, self.target_rate))
    }
}

impl Default for AudioNormalizer {
    fn default() -> Self {
        Self::new(defaults::INPUT_SAMPLE_RATE)
    }
}

fn validate(samples: &[i16], format: AudioFormat) -> Result<()> {
    if samples.is_empty() {
        return Err(TalkGlobeError::InvalidAudioInput {
            message: "no samples".to_string(),
        });
    }
    if !(defaults::MIN_SOURCE_SAMPLE_RATE..=defaults::MAX_SOURCE_SAMPLE_RATE)
        .contains(&format.sample_rate)
    {
        return Err(TalkGlobeError::InvalidAudioInput {
            message: format!("unsupported sample rate {}Hz", format.sample_rate),
        });
    }
    if !matches!(format.channels, 1 | 2) {
        return Err(TalkGlobeError::InvalidAudioInput {
            message: format!("unsupported channel layout: {} channels", format.channels),
        });
    }
    if samples.len() % format.channels as usize != 0 {
        return Err(TalkGlobeError::InvalidAudioInput {
            message: format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                format.channels
            ),
        });
    }
    Ok(())
}

/// Maps signed 16-bit PCM onto -1.0..1.0.
pub fn decode(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| s as f32 / defaults::PCM_FULL_SCALE)
        .collect()
}

fn downmix_stereo(samples: &[f32]) -> Vec<f32> {
    samples
        .chunks_exact(2)
        .map(|pair| (pair[0] + pair[1]) * 0.5)
        .collect()
}
