//! TOML configuration for `dcmp`.
//!
//! Every section is optional; a missing file is replaced by
//! [`Config::minimal`] in the CLI so `dcmp parse` works without setup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/dcmp.sqlite")
}

/// Limits for the document extractor. Timeouts are seconds and may be
/// fractional (`0.25`).
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    #[serde(default = "default_pdf_max_pages")]
    pub pdf_max_pages: usize,
    #[serde(default = "default_pptx_max_slides")]
    pub pptx_max_slides: usize,
    #[serde(default = "default_ooxml_timeout_secs")]
    pub docx_timeout_secs: f64,
    #[serde(default = "default_pdf_timeout_secs")]
    pub pdf_timeout_secs: f64,
    #[serde(default = "default_ooxml_timeout_secs")]
    pub pptx_timeout_secs: f64,
    #[serde(default = "default_ooxml_timeout_secs")]
    pub xlsx_timeout_secs: f64,
    /// Maximum decompressed bytes read from a single ZIP entry (zip-bomb protection).
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            pdf_max_pages: default_pdf_max_pages(),
            pptx_max_slides: default_pptx_max_slides(),
            docx_timeout_secs: default_ooxml_timeout_secs(),
            pdf_timeout_secs: default_pdf_timeout_secs(),
            pptx_timeout_secs: default_ooxml_timeout_secs(),
            xlsx_timeout_secs: default_ooxml_timeout_secs(),
            max_entry_bytes: default_max_entry_bytes(),
        }
    }
}

impl ExtractConfig {
    pub fn docx_timeout(&self) -> Duration {
        seconds(self.docx_timeout_secs)
    }
    pub fn pdf_timeout(&self) -> Duration {
        seconds(self.pdf_timeout_secs)
    }
    pub fn pptx_timeout(&self) -> Duration {
        seconds(self.pptx_timeout_secs)
    }
    pub fn xlsx_timeout(&self) -> Duration {
        seconds(self.xlsx_timeout_secs)
    }
}

// Unvalidated values (negative, NaN) collapse to an immediate timeout.
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

fn default_pdf_max_pages() -> usize {
    50
}
fn default_pptx_max_slides() -> usize {
    30
}
fn default_ooxml_timeout_secs() -> f64 {
    20.0
}
fn default_pdf_timeout_secs() -> f64 {
    30.0
}
fn default_max_entry_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

fn default_ai_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let ex = &config.extract;
    if ex.pdf_max_pages == 0 {
        anyhow::bail!("extract.pdf_max_pages must be > 0");
    }
    if ex.pptx_max_slides == 0 {
        anyhow::bail!("extract.pptx_max_slides must be > 0");
    }
    for (name, secs) in [
        ("docx_timeout_secs", ex.docx_timeout_secs),
        ("pdf_timeout_secs", ex.pdf_timeout_secs),
        ("pptx_timeout_secs", ex.pptx_timeout_secs),
        ("xlsx_timeout_secs", ex.xlsx_timeout_secs),
    ] {
        if !(secs.is_finite() && secs > 0.0) || Duration::try_from_secs_f64(secs).is_err() {
            anyhow::bail!("extract.{} must be a positive number of seconds", name);
        }
    }
    if ex.max_entry_bytes == 0 {
        anyhow::bail!("extract.max_entry_bytes must be > 0");
    }
    if config.ai.timeout_secs == 0 {
        anyhow::bail!("ai.timeout_secs must be > 0");
    }
    Ok(())
}
