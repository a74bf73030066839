use crate::defaults;
use crate::error::{Result, TalkGlobeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub segmenter: SegmenterSettings,
    pub translator: TranslatorSettings,
    pub governor: GovernorSettings,
    pub session: SessionSettings,
    pub languages: LanguageSettings,
}

/// Pause detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterSettings {
    pub speech_threshold: f32,
    pub pause_ms: u32,
    pub min_speech_ms: u32,
    pub window_ms: u32,
    pub max_utterance_ms: Option<u32>,
}

/// Translator input/output format configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslatorSettings {
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub default_language: String,
}

/// Translation job limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GovernorSettings {
    pub max_concurrent_jobs: usize,
    pub time_limit_ms: u64,
}

/// Per-session channel sizing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    pub inbound_capacity: usize,
    pub outbound_capacity: usize,
}

/// Language catalog location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LanguageSettings {
    /// Catalog file; the bundled catalog is used when unset.
    pub catalog: Option<PathBuf>,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::SPEECH_THRESHOLD,
            pause_ms: defaults::PAUSE_DURATION_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            window_ms: defaults::ANALYSIS_WINDOW_MS,
            max_utterance_ms: Some(defaults::MAX_UTTERANCE_MS),
        }
    }
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            input_sample_rate: defaults::INPUT_SAMPLE_RATE,
            output_sample_rate: defaults::OUTPUT_SAMPLE_RATE,
            default_language: defaults::DEFAULT_TARGET_LANGUAGE.to_string(),
        }
    }
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: defaults::MAX_CONCURRENT_JOBS,
            time_limit_ms: defaults::JOB_TIME_LIMIT_MS,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            inbound_capacity: defaults::INBOUND_CAPACITY,
            outbound_capacity: defaults::OUTBOUND_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. The loaded values are validated.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TalkGlobeError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                TalkGlobeError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only a missing file falls back to defaults; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(TalkGlobeError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - TALKGLOBE_LANGUAGE → translator.default_language
    /// - TALKGLOBE_CATALOG → languages.catalog
    /// - TALKGLOBE_MAX_JOBS → governor.max_concurrent_jobs
    /// - TALKGLOBE_TIME_LIMIT_MS → governor.time_limit_ms
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(language) = std::env::var("TALKGLOBE_LANGUAGE")
            && !language.is_empty()
        {
            self.translator.default_language = language;
        }

        if let Ok(catalog) = std::env::var("TALKGLOBE_CATALOG")
            && !catalog.is_empty()
        {
            self.languages.catalog = Some(PathBuf::from(catalog));
        }

        if let Ok(value) = std::env::var("TALKGLOBE_MAX_JOBS")
            && !value.is_empty()
        {
            match value.parse() {
                Ok(jobs) => self.governor.max_concurrent_jobs = jobs,
                Err(_) => tracing::warn!(value = %value, "ignoring invalid TALKGLOBE_MAX_JOBS"),
            }
        }

        if let Ok(value) = std::env::var("TALKGLOBE_TIME_LIMIT_MS")
            && !value.is_empty()
        {
            match value.parse() {
                Ok(limit) => self.governor.time_limit_ms = limit,
                Err(_) => {
                    tracing::warn!(value = %value, "ignoring invalid TALKGLOBE_TIME_LIMIT_MS")
                }
            }
        }

        self
    }

    /// Check that every value is usable by the pipeline.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> Result<()> {
            Err(TalkGlobeError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        }

        let seg = &self.segmenter;
        if !(0.0..=1.0).contains(&seg.speech_threshold) {
            return invalid("segmenter.speech_threshold", "must be between 0.0 and 1.0");
        }
        if seg.window_ms == 0 {
            return invalid("segmenter.window_ms", "must be at least 1");
        }
        if seg.pause_ms == 0 {
            return invalid("segmenter.pause_ms", "must be at least 1");
        }
        if seg.max_utterance_ms == Some(0) {
            return invalid("segmenter.max_utterance_ms", "must be at least 1");
        }
        if self.translator.input_sample_rate == 0 {
            return invalid("translator.input_sample_rate", "must be positive");
        }
        if self.translator.output_sample_rate == 0 {
            return invalid("translator.output_sample_rate", "must be positive");
        }
        if self.translator.default_language.trim().is_empty() {
            return invalid("translator.default_language", "must not be empty");
        }
        if self.governor.max_concurrent_jobs == 0 {
            return invalid("governor.max_concurrent_jobs", "must be at least 1");
        }
        if self.governor.time_limit_ms == 0 {
            return invalid("governor.time_limit_ms", "must be at least 1");
        }
        if self.session.inbound_capacity == 0 || self.session.outbound_capacity == 0 {
            return invalid("session", "channel capacities must be at least 1");
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/talkglobe/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(defaults::APP_DIR).join("config.toml"))
    }
}
