//! Supported target-language catalog.
//!
//! Maps display names to language codes. Built once at startup and shared
//! read-only (behind an `Arc`) by every session; only languages the model can
//! speak are kept.

use crate::error::{Result, TalkGlobeError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Catalog bundled into the binary.
const BUILTIN_CATALOG: &str = include_str!("../configs/supported_languages.toml");

/// A language the translator can produce speech in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    /// Display name (e.g., "French")
    pub name: String,
    /// Language code passed to the translator (e.g., "fra")
    pub code: String,
}

/// Output modality a catalog entry supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Speech,
    Text,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    language: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
    code: String,
    #[serde(default)]
    targets: Vec<Modality>,
}

/// Immutable set of supported speech target languages, sorted by name.
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    languages: Vec<Language>,
    by_code: HashMap<String, usize>,
}

impl LanguageCatalog {
    /// Builds a catalog from `(display name, code)` pairs.
    ///
    /// Entries are sorted by display name. Empty codes, duplicate codes and an
    /// empty result are rejected.
    pub fn from_entries<I, N, C>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        let mut languages: Vec<Language> = entries
            .into_iter()
            .map(|(name, code)| Language {
                name: name.into().trim().to_string(),
                code: code.into().trim().to_string(),
            })
            .collect();

        if languages.is_empty() {
            return Err(TalkGlobeError::Catalog {
                message: "catalog contains no speech languages".to_string(),
            });
        }

        languages.sort_by(|a, b| a.name.cmp(&b.name));

        let mut by_code = HashMap::with_capacity(languages.len());
        for (idx, language) in languages.iter().enumerate() {
            if language.code.is_empty() {
                return Err(TalkGlobeError::Catalog {
                    message: format!("language '{}' has an empty code", language.name),
                });
            }
            if by_code.insert(language.code.clone(), idx).is_some() {
                return Err(TalkGlobeError::Catalog {
                    message: format!("duplicate language code '{}'", language.code),
                });
            }
        }

        Ok(Self { languages, by_code })
    }

    /// Parses a TOML catalog, keeping only entries with a speech target.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents).map_err(|e| TalkGlobeError::Catalog {
            message: format!("failed to parse catalog: {}", e),
        })?;

        Self::from_entries(
            file.language
                .into_iter()
                .filter(|entry| entry.targets.contains(&Modality::Speech))
                .map(|entry| (entry.name, entry.code)),
        )
    }

    /// Loads a TOML catalog from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// The catalog shipped with talkglobe.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Loads from `path` when given, otherwise the builtin catalog.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    /// Returns true if `code` is a supported speech target.
    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    /// Looks up a language by code.
    pub fn get(&self, code: &str) -> Option<&Language> {
        self.by_code.get(code).map(|&idx| &self.languages[idx])
    }

    /// All languages, sorted by display name.
    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}
