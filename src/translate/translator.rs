use crate::audio::frame::Waveform;
use crate::error::{Result, TalkGlobeError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Trait for speech-to-speech translation.
///
/// This trait allows swapping implementations (real model vs mock).
/// Calls are synchronous and may take seconds; they always run on the
/// blocking pool behind the job governor.
pub trait Translator: Send + Sync {
    /// Translate spoken audio into speech in `target_language`.
    ///
    /// # Arguments
    /// * `waveform` - Mono audio at the translator's input rate
    /// * `target_language` - Catalog language code (e.g., "fra")
    ///
    /// # Returns
    /// Translated speech, or an error. There is no partial output.
    fn translate(&self, waveform: &Waveform, target_language: &str) -> Result<Waveform>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the translator is ready
    fn is_ready(&self) -> bool;
}

/// Implement Translator for Arc<T> to allow sharing across sessions.
impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(&self, waveform: &Waveform, target_language: &str) -> Result<Waveform> {
        (**self).translate(waveform, target_language)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Returns its input unchanged. Used by `talkglobe replay`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranslator;

impl Translator for PassthroughTranslator {
    fn translate(&self, waveform: &Waveform, _target_language: &str) -> Result<Waveform> {
        Ok(waveform.clone())
    }

    fn model_name(&self) -> &str {
        "passthrough"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Mock translator for testing
///
/// Echoes its input by default. Counts calls so tests can assert the model
/// was never reached.
#[derive(Debug, Default)]
pub struct MockTranslator {
    model_name: String,
    response: Option<Waveform>,
    should_fail: bool,
    failing_language: Option<String>,
    delays: Vec<Duration>,
    calls: AtomicUsize,
}

impl MockTranslator {
    /// Create a new mock translator with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            ..Self::default()
        }
    }

    /// Configure the mock to return a fixed waveform
    pub fn with_response(mut self, response: Waveform) -> Self {
        self.response = Some(response);
        self
    }

    /// Configure the mock to fail on translate
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure the mock to fail only for one target language
    pub fn with_failure_for(mut self, language: &str) -> Self {
        self.failing_language = Some(language.to_string());
        self
    }

    /// Sleep this long on every call
    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_delays(vec![delay])
    }

    /// Sleep `delays[n]` on the n-th call; the last entry repeats.
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    /// Number of times `translate` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Translator for MockTranslator {
    fn translate(&self, waveform: &Waveform, target_language: &str) -> Result<Waveform> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(call).or(self.delays.last()) {
            std::thread::sleep(*delay);
        }

        if self.should_fail || self.failing_language.as_deref() == Some(target_language) {
            return Err(TalkGlobeError::TranslationFailed {
                message: "mock translation failure".to_string(),
            });
        }

        Ok(self.response.clone().unwrap_or_else(|| waveform.clone()))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}
