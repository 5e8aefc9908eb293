//! Entry points behind the `dcmp` subcommands.
//!
//! Each `run_*` function loads what it needs from the [`Config`], does the
//! work through the library modules and prints to stdout. Diagnostics go
//! through `tracing` to stderr.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::analysis::AnalysisClient;
use crate::compare::{self, TextComparison};
use crate::config::Config;
use crate::extract::{Extractor, SourceFile};
use crate::models::{AiAnalysisResult, FileParseResult, NewRecord, PropertyStatus};
use crate::recent::{RecentRecords, RecordMode};
use crate::settings::{Settings, SettingsStore};
use crate::storage::{KeyValueStore, SqliteStorage};

/// Characters of each segment shown in terminal output.
const EXCERPT_CHARS: usize = 120;

async fn open_storage(config: &Config) -> Result<Arc<SqliteStorage>> {
    Ok(Arc::new(SqliteStorage::open(config).await?))
}

async fn load_settings(storage: Arc<dyn KeyValueStore>) -> SettingsStore {
    let mut store = SettingsStore::new(storage);
    store.load().await;
    store
}

/// Reads and parses one file. A result carrying an error is returned as
/// `Err` so callers stop before comparing empty content.
async fn parse_file(extractor: &Extractor, path: &Path) -> Result<(SourceFile, FileParseResult)> {
    let file = SourceFile::from_path(path).await?;
    let parsed = extractor.parse(&file).await;
    if let Some(err) = &parsed.error {
        bail!("{}: {}", file.name, err);
    }
    Ok((file, parsed))
}

pub async fn run_parse(config: &Config, path: &Path, json: bool) -> Result<()> {
    let extractor = Extractor::new(config.extract.clone());
    let file = SourceFile::from_path(path).await?;
    let parsed = extractor.parse(&file).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    if let Some(err) = &parsed.error {
        bail!("{}: {}", file.name, err);
    }
    println!("--- Properties ---");
    for (label, value) in parsed.properties.entries() {
        println!("{:<16}{}", format!("{}:", label), value.unwrap_or(""));
    }
    if let Some(pages) = parsed.pages {
        println!("{:<16}{}", "Pages:", pages);
    }
    println!();
    println!("--- Content ---");
    println!("{}", parsed.content);
    Ok(())
}

pub async fn run_compare(
    config: &Config,
    left: &Path,
    right: &Path,
    analyze: bool,
    record: bool,
) -> Result<()> {
    let storage = open_storage(config).await?;
    let settings = load_settings(storage.clone()).await;
    let extractor = Extractor::new(config.extract.clone());

    let (left_file, left_parsed) = parse_file(&extractor, left).await?;
    let (right_file, right_parsed) = parse_file(&extractor, right).await?;

    let cmp = compare::compare_texts(&left_parsed.content, &right_parsed.content, settings.settings());
    print_comparison(&cmp, settings.settings());

    if analyze {
        let client = AnalysisClient::from_config(&config.ai)?;
        let result = client
            .analyze(
                settings.settings(),
                &left_parsed.content,
                &right_parsed.content,
                &cmp.similarity,
                &cmp.segments,
            )
            .await;
        println!();
        print_analysis(&result);
    }

    if record {
        let mut history = RecentRecords::new(storage.clone(), RecordMode::FileCompare);
        history.load().await;
        let mut entry = NewRecord::for_pair(&left_file.name, &right_file.name, cmp.similarity.clone());
        entry.similar_segments = Some(cmp.segments);
        let id = history.add(entry).await?;
        tracing::info!(id, "comparison recorded");
    }

    storage.close().await;
    Ok(())
}

pub async fn run_analyze(config: &Config, left: &Path, right: &Path) -> Result<()> {
    let storage = open_storage(config).await?;
    let settings = load_settings(storage.clone()).await;
    storage.close().await;

    let extractor = Extractor::new(config.extract.clone());
    let (_, left_parsed) = parse_file(&extractor, left).await?;
    let (_, right_parsed) = parse_file(&extractor, right).await?;
    let cmp = compare::compare_texts(&left_parsed.content, &right_parsed.content, settings.settings());

    let client = AnalysisClient::from_config(&config.ai)?;
    let result = client
        .analyze(
            settings.settings(),
            &left_parsed.content,
            &right_parsed.content,
            &cmp.similarity,
            &cmp.segments,
        )
        .await;
    print_analysis(&result);
    if let Some(err) = result.error {
        bail!(err);
    }
    Ok(())
}

pub async fn run_properties(config: &Config, left: &Path, right: &Path, record: bool) -> Result<()> {
    let extractor = Extractor::new(config.extract.clone());
    let (left_file, left_parsed) = parse_file(&extractor, left).await?;
    let (right_file, right_parsed) = parse_file(&extractor, right).await?;

    let details = compare::compare_properties(&left_parsed.properties, &right_parsed.properties);
    let matched = details
        .iter()
        .filter(|d| d.status == PropertyStatus::Match)
        .count();
    let share = if details.is_empty() {
        0.0
    } else {
        matched as f64 / details.len() as f64 * 100.0
    };
    let similarity = compare::format_percent(share);

    println!("{:<16}{:<28}{:<28}status", "property", left_file.name, right_file.name);
    for d in &details {
        let status = match d.status {
            PropertyStatus::Match => "match",
            PropertyStatus::Mismatch => "MISMATCH",
            PropertyStatus::Warning => "warning",
        };
        println!("{:<16}{:<28}{:<28}{}", d.name, d.left_value, d.right_value, status);
    }
    println!();
    println!("{} of {} properties match ({})", matched, details.len(), similarity);

    if record {
        let storage = open_storage(config).await?;
        let mut history = RecentRecords::new(storage.clone(), RecordMode::PropertyCheck);
        history.load().await;
        let mut entry = NewRecord::for_pair(&left_file.name, &right_file.name, similarity);
        entry.property_details = Some(details);
        history.add(entry).await?;
        storage.close().await;
    }
    Ok(())
}

fn print_comparison(cmp: &TextComparison, settings: &Settings) {
    let verdict = if cmp.exceeds_threshold(settings) {
        "above"
    } else {
        "below"
    };
    println!(
        "Similarity: {} ({} the {}% threshold)",
        cmp.similarity, verdict, settings.text_similarity_threshold
    );
    println!("Similar segments: {}", cmp.segments.len());
    for seg in &cmp.segments {
        println!();
        println!(
            "[{}] {:?} {} left {} / right {}",
            seg.id, seg.level, seg.similarity, seg.left_page, seg.right_page
        );
        println!("  < {}", excerpt(&seg.left_content));
        println!("  > {}", excerpt(&seg.right_content));
    }
}

fn print_analysis(result: &AiAnalysisResult) {
    println!("--- AI analysis ---");
    if let Some(err) = &result.error {
        eprintln!("Error: {}", err);
    }
    println!("{}", result.summary);
    if !result.insights.is_empty() {
        println!();
        println!("Insights:");
        for line in &result.insights {
            println!("  - {}", line);
        }
    }
    if !result.suggestions.is_empty() {
        println!();
        println!("Suggestions:");
        for line in &result.suggestions {
            println!("  * {}", line);
        }
    }
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ============ Settings ============

pub async fn run_settings_show(config: &Config) -> Result<()> {
    let storage = open_storage(config).await?;
    let store = load_settings(storage.clone()).await;
    storage.close().await;

    let mut shown = store.settings().clone();
    shown.api_key = mask_key(&shown.api_key);
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

pub async fn run_settings_set(config: &Config, field: &str, value: &str) -> Result<()> {
    let storage = open_storage(config).await?;
    let mut store = load_settings(storage.clone()).await;
    store.settings_mut().set_field(field, value)?;
    store.save().await?;
    storage.close().await;
    println!("{} updated.", field);
    Ok(())
}

pub async fn run_settings_reset(config: &Config) -> Result<()> {
    let storage = open_storage(config).await?;
    let mut store = load_settings(storage.clone()).await;
    store.reset();
    store.save().await?;
    storage.close().await;
    println!("Settings restored to defaults.");
    Ok(())
}

fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}

// ============ History ============

pub async fn run_history_list(config: &Config, mode: RecordMode, json: bool) -> Result<()> {
    let storage = open_storage(config).await?;
    let mut history = RecentRecords::new(storage.clone(), mode);
    history.load().await;
    storage.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(history.records())?);
        return Ok(());
    }
    if history.records().is_empty() {
        println!("No recent records.");
        return Ok(());
    }
    for rec in history.records() {
        println!("{:>14}  {}  {:>7}  {}", rec.id, rec.timestamp, rec.similarity, rec.filename);
    }
    Ok(())
}

pub async fn run_history_delete(config: &Config, mode: RecordMode, id: u64) -> Result<()> {
    let storage = open_storage(config).await?;
    let mut history = RecentRecords::new(storage.clone(), mode);
    history.load().await;
    let removed = history.delete(id).await?;
    storage.close().await;
    if !removed {
        bail!("record not found: {}", id);
    }
    println!("Record {} deleted.", id);
    Ok(())
}

pub async fn run_history_clear(config: &Config, mode: RecordMode) -> Result<()> {
    let storage = open_storage(config).await?;
    let mut history = RecentRecords::new(storage.clone(), mode);
    history.clear_all().await?;
    storage.close().await;
    println!("History cleared.");
    Ok(())
}
