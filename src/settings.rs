//! User settings: comparison thresholds, normalization flags and AI
//! credentials, persisted under the `fileCompareSettings` key.
//!
//! Loading never fails: persisted fields are merged onto defaults one by
//! one, and an unreadable value resets everything to defaults. Numeric
//! ranges are not validated; out-of-range thresholds are stored as given.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::storage::KeyValueStore;

pub const SETTINGS_KEY: &str = "fileCompareSettings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub min_duplicate_words: i64,
    /// Percent, nominally 0–100.
    pub text_similarity_threshold: f64,
    /// Percent, nominally 0–100.
    pub image_similarity_threshold: f64,
    pub ignore_punctuation: bool,
    pub ignore_whitespace: bool,
    pub ignore_case: bool,
    /// One of `gpt-3.5`, `gpt-4`, `gemini`, `claude`. Checked when an
    /// analysis is requested, not here.
    pub selected_model: String,
    pub api_key: String,
    /// Empty means the vendor's default endpoint.
    pub api_endpoint: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_duplicate_words: 8,
            text_similarity_threshold: 75.0,
            image_similarity_threshold: 80.0,
            ignore_punctuation: true,
            ignore_whitespace: true,
            ignore_case: false,
            selected_model: "gpt-3.5".to_string(),
            api_key: String::new(),
            api_endpoint: String::new(),
        }
    }
}

impl Settings {
    /// Sets one field by its persisted (camelCase) name.
    ///
    /// Only type errors are reported; range checks are deliberately absent.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match name {
            "minDuplicateWords" => {
                self.min_duplicate_words = value
                    .parse()
                    .with_context(|| format!("{} expects an integer", name))?
            }
            "textSimilarityThreshold" => {
                self.text_similarity_threshold = value
                    .parse()
                    .with_context(|| format!("{} expects a number", name))?
            }
            "imageSimilarityThreshold" => {
                self.image_similarity_threshold = value
                    .parse()
                    .with_context(|| format!("{} expects a number", name))?
            }
            "ignorePunctuation" => self.ignore_punctuation = parse_bool(name, value)?,
            "ignoreWhitespace" => self.ignore_whitespace = parse_bool(name, value)?,
            "ignoreCase" => self.ignore_case = parse_bool(name, value)?,
            "selectedModel" => self.selected_model = value.to_string(),
            "apiKey" => self.api_key = value.to_string(),
            "apiEndpoint" => self.api_endpoint = value.to_string(),
            other => bail!("unknown setting: {}", other),
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("{} expects true or false, got '{}'", name, value),
    }
}

/// Owns the live settings for one session.
pub struct SettingsStore {
    storage: Arc<dyn KeyValueStore>,
    settings: Settings,
}

impl SettingsStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            settings: Settings::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Replaces the live settings with the persisted ones.
    ///
    /// A missing key leaves the live settings untouched. Malformed JSON or a
    /// storage failure resets to defaults.
    pub async fn load(&mut self) {
        let raw = match self.storage.get(SETTINGS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read settings, using defaults");
                self.reset();
                return;
            }
        };
        match serde_json::from_str::<Settings>(&raw) {
            Ok(parsed) => self.settings = parsed,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load settings, using defaults");
                self.reset();
            }
        }
    }

    /// Writes the live settings verbatim.
    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_string(&self.settings)?;
        self.storage
            .set(SETTINGS_KEY, &json)
            .await
            .context("failed to save settings")?;
        tracing::info!(model = %self.settings.selected_model, "settings saved");
        Ok(())
    }

    /// Restores defaults in memory only; call [`save`](Self::save) to persist.
    pub fn reset(&mut self) {
        self.settings = Settings::default();
    }

    /// Discards unsaved edits.
    pub async fn cancel(&mut self) {
        self.load().await;
    }
}
