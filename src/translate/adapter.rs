//! Guards every translator call.
//!
//! Checks the request before the model sees it and checks the model's output
//! before it leaves the pipeline, so callers always get either a well-formed
//! waveform at the output rate or a typed error.

use crate::audio::frame::Waveform;
use crate::audio::resample::resample_mono;
use crate::catalog::LanguageCatalog;
use crate::defaults;
use crate::error::{Result, TalkGlobeError};
use crate::translate::translator::Translator;
use std::sync::Arc;

/// One utterance ready for translation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    /// Sequence of the source utterance within its session.
    pub sequence: u64,
    /// Normalized audio at the translator input rate.
    pub waveform: Waveform,
    pub target_language: String,
}

impl TranslationRequest {
    pub fn new(sequence: u64, waveform: Waveform, target_language: impl Into<String>) -> Self {
        Self {
            sequence,
            waveform,
            target_language: target_language.into(),
        }
    }
}

/// Translated speech for one utterance, always at the adapter's output rate.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationResult {
    pub sequence: u64,
    pub waveform: Waveform,
}

/// Validates requests, calls the shared translator and shapes its output.
#[derive(Clone)]
pub struct TranslatorAdapter {
    translator: Arc<dyn Translator>,
    catalog: Arc<LanguageCatalog>,
    output_rate: u32,
}

impl TranslatorAdapter {
    pub fn new(translator: Arc<dyn Translator>, catalog: Arc<LanguageCatalog>) -> Self {
        Self::with_output_rate(translator, catalog, defaults::OUTPUT_SAMPLE_RATE)
    }

    pub fn with_output_rate(
        translator: Arc<dyn Translator>,
        catalog: Arc<LanguageCatalog>,
        output_rate: u32,
    ) -> Self {
        Self {
            translator,
            catalog,
            output_rate,
        }
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    pub fn model_name(&self) -> &str {
        self.translator.model_name()
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Translates one utterance. Blocking.
    ///
    /// # Errors
    /// - `UnsupportedLanguage` if the code is not in the catalog
    /// - `InvalidAudioInput` if the waveform is empty
    /// - `TranslationFailed` if the model fails or returns unusable audio
    ///
    /// The first two are raised without calling the model.
    pub fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        self.check(request)?;

        let output = self
            .translator
            .translate(&request.waveform, &request.target_language)
            .map_err(|e| match e {
                TalkGlobeError::TranslationFailed { .. } => e,
                other => TalkGlobeError::TranslationFailed {
                    message: other.to_string(),
                },
            })?;

        Ok(TranslationResult {
            sequence: request.sequence,
            waveform: self.shape_output(output)?,
        })
    }

    /// Rejects requests the translator must never see.
    pub fn check(&self, request: &TranslationRequest) -> Result<()> {
        if !self.catalog.contains(&request.target_language) {
            return Err(TalkGlobeError::UnsupportedLanguage {
                code: request.target_language.clone(),
            });
        }
        if request.waveform.is_empty() {
            return Err(TalkGlobeError::InvalidAudioInput {
                message: "utterance has no samples".to_string(),
            });
        }
        Ok(())
    }

    fn shape_output(&self, output: Waveform) -> Result<Waveform> {
        if output.is_empty() {
            return Err(TalkGlobeError::TranslationFailed {
                message: format!("{} returned no audio", self.model_name()),
            });
        }
        if output.samples.iter().any(|s| !s.is_finite()) {
            return Err(TalkGlobeError::TranslationFailed {
                message: format!("{} returned non-finite samples", self.model_name()),
            });
        }
        if output.sample_rate == self.output_rate {
            return Ok(output);
        }

        let samples = resample_mono(&output.samples, output.sample_rate, self.output_rate)
            .map_err(|e| TalkGlobeError::TranslationFailed {
                message: format!("could not convert model output: {}", e),
            })?;
        if samples.is_empty() {
            return Err(TalkGlobeError::TranslationFailed {
                message: format!("{} returned too little audio", self.model_name()),
            });
        }
        Ok(Waveform::new(samples, self.output_rate))
    }
}

impl std::fmt::Debug for TranslatorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorAdapter")
            .field("model", &self.translator.model_name())
            .field("languages", &self.catalog.len())
            .field("output_rate", &self.output_rate)
            .finish()
    }
}
