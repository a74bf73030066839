//! Audio types, level detection, and format normalization.

pub mod frame;
pub mod normalizer;
pub mod resample;
pub mod vad;
pub mod wav;

pub use frame::{AudioFormat, AudioFrame, Utterance, Waveform};
pub use normalizer::AudioNormalizer;
pub use vad::{EnergyVad, calculate_rms};
pub use wav::WavClip;
