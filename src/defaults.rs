//! Default configuration constants for talkglobe.
//!
//! Shared by the TOML config, the runtime settings built from it, and the
//! tests, so every layer agrees on the same values.

/// Sample rate the translator expects its input waveform at, in Hz.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of every translated waveform emitted downstream, in Hz.
pub const OUTPUT_SAMPLE_RATE: u32 = 16_000;

/// Lowest source sample rate the normalizer accepts.
pub const MIN_SOURCE_SAMPLE_RATE: u32 = 4_000;

/// Highest source sample rate the normalizer accepts.
pub const MAX_SOURCE_SAMPLE_RATE: u32 = 384_000;

/// Full-scale value of signed 16-bit PCM.
///
/// Dividing by this maps `i16::MIN` to exactly -1.0.
pub const PCM_FULL_SCALE: f32 = 32_768.0;

/// Maximum number of translation jobs running at once across all sessions.
pub const MAX_CONCURRENT_JOBS: usize = 5;

/// Wall-clock limit for a single translation job, in milliseconds.
pub const JOB_TIME_LIMIT_MS: u64 = 60_000;

/// RMS level (0.0 to 1.0) above which an analysis window counts as speech.
pub const SPEECH_THRESHOLD: f32 = 0.02;

/// Trailing silence that ends an utterance, in milliseconds.
pub const PAUSE_DURATION_MS: u32 = 600;

/// Minimum amount of speech an utterance must contain to be translated.
///
/// Coughs and clicks shorter than this are dropped at the pause.
pub const MIN_SPEECH_MS: u32 = 200;

/// Length of one segmenter analysis window, in milliseconds.
pub const ANALYSIS_WINDOW_MS: u32 = 20;

/// Longest utterance the segmenter buffers before forcing it out, in milliseconds.
///
/// Bounds per-session memory when the input never drops below the speech threshold.
pub const MAX_UTTERANCE_MS: u32 = 30_000;

/// Target language used when a session does not pick one.
pub const DEFAULT_TARGET_LANGUAGE: &str = "eng";

/// Capacity of the per-session inbound frame channel.
pub const INBOUND_CAPACITY: usize = 256;

/// Capacity of the per-session outbound translated-audio channel.
pub const OUTBOUND_CAPACITY: usize = 16;

/// Frame length used when replaying a WAV file as a live stream.
pub const REPLAY_FRAME_MS: u32 = 20;

/// Application directory name under the user's config directory.
pub const APP_DIR: &str = "talkglobe";
