//! Error types for talkglobe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TalkGlobeError {
    // Per-utterance pipeline errors
    #[error("Invalid audio input: {message}")]
    InvalidAudioInput { message: String },

    #[error("Unsupported target language: {code}")]
    UnsupportedLanguage { code: String },

    #[error("Translation failed: {message}")]
    TranslationFailed { message: String },

    #[error("Translation exceeded time limit of {limit_ms}ms")]
    TranslationTimeout { limit_ms: u64 },

    // Session lifecycle errors
    #[error("Session {session_id} was torn down")]
    SessionTeardown { session_id: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Language catalog errors
    #[error("Language catalog error: {message}")]
    Catalog { message: String },

    // WAV file errors
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl TalkGlobeError {
    /// Returns true for errors that only cost one utterance.
    ///
    /// The session that hit them keeps listening for further speech.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TalkGlobeError::InvalidAudioInput { .. }
                | TalkGlobeError::UnsupportedLanguage { .. }
                | TalkGlobeError::TranslationFailed { .. }
                | TalkGlobeError::TranslationTimeout { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TalkGlobeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_invalid_audio_input_display() {
        let error = TalkGlobeError::InvalidAudioInput {
            message: "no samples".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid audio input: no samples");
    }

    #[test]
    fn test_unsupported_language_display() {
        let error = TalkGlobeError::UnsupportedLanguage {
            code: "xyz".to_string(),
        };
        assert_eq!(error.to_string(), "Unsupported target language: xyz");
    }

    #[test]
    fn test_translation_timeout_display() {
        let error = TalkGlobeError::TranslationTimeout { limit_ms: 60_000 };
        assert_eq!(
            error.to_string(),
            "Translation exceeded time limit of 60000ms"
        );
    }

    #[test]
    fn test_session_not_found_display() {
        let error = TalkGlobeError::SessionNotFound {
            session_id: "abc".to_string(),
        };
        assert_eq!(error.to_string(), "Session not found: abc");
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = TalkGlobeError::ConfigInvalidValue {
            key: "governor.max_concurrent_jobs".to_string(),
            message: "must be at least 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for governor.max_concurrent_jobs: must be at least 1"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: TalkGlobeError = io_error.into();
        assert!(matches!(error, TalkGlobeError::Io(_)));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse_error = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let error: TalkGlobeError = parse_error.into();
        assert!(matches!(error, TalkGlobeError::Config(_)));
    }

    #[test]
    fn test_pipeline_errors_are_recoverable() {
        assert!(
            TalkGlobeError::InvalidAudioInput {
                message: String::new()
            }
            .is_recoverable()
        );
        assert!(
            TalkGlobeError::UnsupportedLanguage {
                code: String::new()
            }
            .is_recoverable()
        );
        assert!(
            TalkGlobeError::TranslationFailed {
                message: String::new()
            }
            .is_recoverable()
        );
        assert!(TalkGlobeError::TranslationTimeout { limit_ms: 1 }.is_recoverable());
    }

    #[test]
    fn test_setup_errors_are_not_recoverable() {
        assert!(
            !TalkGlobeError::SessionTeardown {
                session_id: String::new()
            }
            .is_recoverable()
        );
        assert!(
            !TalkGlobeError::Catalog {
                message: String::new()
            }
            .is_recoverable()
        );
        assert!(!TalkGlobeError::Other("x".to_string()).is_recoverable());
    }
}
