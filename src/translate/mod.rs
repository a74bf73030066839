//! Speech-to-speech translation behind a narrow trait.

pub mod adapter;
pub mod translator;

pub use adapter::{TranslationRequest, TranslationResult, TranslatorAdapter};
pub use translator::{MockTranslator, PassthroughTranslator, Translator};
