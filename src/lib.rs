//! talkglobe - Streaming speech-to-speech translation
//!
//! Splits each client's live audio into utterances on pauses, translates
//! every utterance through a shared model under a global concurrency limit,
//! and streams the translated speech back in the order it was spoken.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod catalog;
pub mod config;
pub mod defaults;
pub mod error;
pub mod streaming;
pub mod translate;

#[cfg(feature = "cli")]
pub mod app;
#[cfg(feature = "cli")]
pub mod cli;

// Audio
pub use audio::{AudioFormat, AudioFrame, AudioNormalizer, Utterance, Waveform};

// Translation seam
pub use translate::{MockTranslator, PassthroughTranslator, Translator, TranslatorAdapter};

// Sessions
pub use streaming::{
    ConcurrencyGovernor, ConnectionEvent, SessionId, SessionInfo, SessionManager,
    SessionSummary, TranslatedAudio, UtterancePipeline, UtteranceSegmenter,
};

// Error handling
pub use error::{Result, TalkGlobeError};

// Config
pub use catalog::LanguageCatalog;
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
