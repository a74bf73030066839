//! Per-utterance processing chain.
//!
//! Utterance → Normalizer → Governor(Adapter → Translator) → TranslationResult

use crate::audio::frame::Utterance;
use crate::audio::normalizer::AudioNormalizer;
use crate::catalog::LanguageCatalog;
use crate::config::Config;
use crate::error::{Result, TalkGlobeError};
use crate::streaming::governor::ConcurrencyGovernor;
use crate::translate::adapter::{TranslationRequest, TranslationResult, TranslatorAdapter};
use crate::translate::translator::Translator;
use std::sync::Arc;

/// Everything needed to turn one utterance into translated speech.
///
/// Cheap to clone; all clones share the translator, catalog and governor.
#[derive(Clone, Debug)]
pub struct UtterancePipeline {
    normalizer: AudioNormalizer,
    adapter: TranslatorAdapter,
    governor: Arc<ConcurrencyGovernor>,
}

impl UtterancePipeline {
    pub fn new(
        normalizer: AudioNormalizer,
        adapter: TranslatorAdapter,
        governor: Arc<ConcurrencyGovernor>,
    ) -> Self {
        Self {
            normalizer,
            adapter,
            governor,
        }
    }

    /// Creates the pipeline described by `config`.
    pub fn from_config(
        config: &Config,
        translator: Arc<dyn Translator>,
        catalog: Arc<LanguageCatalog>,
    ) -> Self {
        Self::new(
            AudioNormalizer::new(config.translator.input_sample_rate),
            TranslatorAdapter::with_output_rate(
                translator,
                catalog,
                config.translator.output_sample_rate,
            ),
            Arc::new(ConcurrencyGovernor::from_config(&config.governor)),
        )
    }

    pub fn governor(&self) -> &Arc<ConcurrencyGovernor> {
        &self.governor
    }

    pub fn adapter(&self) -> &TranslatorAdapter {
        &self.adapter
    }

    /// Normalizes and translates one utterance.
    ///
    /// Requests the adapter would reject are refused before queueing for a
    /// governor slot, so they never hold up other sessions.
    pub async fn process(
        &self,
        utterance: Utterance,
        target_language: &str,
    ) -> Result<TranslationResult> {
        let sequence = utterance.sequence;
        let normalizer = self.normalizer;
        let waveform = tokio::task::spawn_blocking(move || normalizer.normalize(&utterance))
            .await
            .map_err(|e| TalkGlobeError::InvalidAudioInput {
                message: format!("normalization task panicked: {}", e),
            })??;

        let request = TranslationRequest::new(sequence, waveform, target_language);
        self.adapter.check(&request)?;

        let adapter = self.adapter.clone();
        self.governor.run(move || adapter.translate(&request)).await
    }
}
