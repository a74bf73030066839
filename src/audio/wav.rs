//! WAV file input and output for replaying recordings through a session.

use crate::audio::frame::{AudioFormat, AudioFrame};
use crate::error::{Result, TalkGlobeError};
use std::io::Read;
use std::path::Path;

/// A decoded WAV recording, kept at its native rate and channel layout.
#[derive(Debug, Clone, PartialEq)]
pub struct WavClip {
    /// Interleaved 16-bit PCM samples.
    pub samples: Vec<i16>,
    /// Format of `samples`.
    pub format: AudioFormat,
}

impl WavClip {
    /// Create from any reader (for testing/flexibility).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader)?;
        let spec = wav_reader.spec();

        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => wav_reader
                .samples::<i16>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (hound::SampleFormat::Float, 32) => wav_reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (format, bits) => {
                return Err(TalkGlobeError::InvalidAudioInput {
                    message: format!("unsupported WAV encoding: {:?} {}-bit", format, bits),
                });
            }
        };

        Ok(Self {
            samples,
            format: AudioFormat::new(spec.sample_rate, spec.channels),
        })
    }

    /// Open a WAV file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Returns the duration of the clip in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        self.format.duration_ms(self.samples.len())
    }

    /// Splits the clip into consecutive frames of `frame_ms` milliseconds.
    ///
    /// The last frame may be shorter.
    pub fn frames(&self, frame_ms: u32) -> Vec<AudioFrame> {
        let min_len = self.format.channels.max(1) as usize;
        let frame_len = self.format.samples_for_ms(frame_ms).max(min_len);
        self.samples
            .chunks(frame_len)
            .enumerate()
            .map(|(idx, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                format: self.format,
                sequence: idx as u64,
            })
            .collect()
    }
}

/// Write mono `f32` audio as a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Converts one `f32` sample to 16-bit PCM, clamping out-of-range values.
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
