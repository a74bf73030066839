//! Audio value types that flow through the utterance pipeline.

use crate::error::{Result, TalkGlobeError};

/// Sample rate and channel layout of a stream of interleaved PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second, per channel.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Mono format at the given rate.
    pub fn mono(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1)
    }

    /// Number of interleaved samples covering `ms` milliseconds.
    pub fn samples_for_ms(&self, ms: u32) -> usize {
        (self.sample_rate as u64 * ms as u64 / 1000) as usize * self.channels as usize
    }

    /// Duration in milliseconds of `samples` interleaved samples.
    pub fn duration_ms(&self, samples: usize) -> u32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = samples as u64 / self.channels as u64;
        (frames * 1000 / self.sample_rate as u64) as u32
    }
}

/// A short slice of raw captured audio as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Interleaved 16-bit PCM samples.
    pub samples: Vec<i16>,
    /// Format of `samples`.
    pub format: AudioFormat,
    /// Sequence number assigned by the sender, for gap detection.
    pub sequence: u64,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16, sequence: u64) -> Self {
        Self {
            samples,
            format: AudioFormat::new(sample_rate, channels),
            sequence,
        }
    }

    /// Creates a mono audio frame.
    pub fn mono(samples: Vec<i16>, sample_rate: u32, sequence: u64) -> Self {
        Self::new(samples, sample_rate, 1, sequence)
    }

    /// Returns the duration of this frame in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        self.format.duration_ms(self.samples.len())
    }

    /// Checks the frame is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.format.sample_rate == 0 {
            return Err(TalkGlobeError::InvalidAudioInput {
                message: "frame has a sample rate of 0".to_string(),
            });
        }
        if self.format.channels == 0 {
            return Err(TalkGlobeError::InvalidAudioInput {
                message: "frame has 0 channels".to_string(),
            });
        }
        if self.samples.len() % self.format.channels as usize != 0 {
            return Err(TalkGlobeError::InvalidAudioInput {
                message: format!(
                    "{} samples do not divide into {} channels",
                    self.samples.len(),
                    self.format.channels
                ),
            });
        }
        Ok(())
    }
}

/// One contiguous spoken segment, bounded by silence.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Position in the session's detection order, starting at 0.
    pub sequence: u64,
    /// Interleaved 16-bit PCM samples, trailing silence excluded.
    pub samples: Vec<i16>,
    /// Format of `samples`.
    pub format: AudioFormat,
}

impl Utterance {
    /// Returns the duration of this utterance in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        self.format.duration_ms(self.samples.len())
    }
}

/// Floating-point mono audio in the -1.0..=1.0 range.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
