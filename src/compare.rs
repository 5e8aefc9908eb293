//! Text and property comparison between two parsed files.
//!
//! Text comparison works on words. Each word gets a comparison key built by
//! [`normalize`] under the active [`Settings`]; runs of at least
//! `min_duplicate_words` equal keys present on both sides become
//! [`SimilarSegment`]s. Overall similarity is the share of left-hand words
//! covered by some segment.

use std::collections::HashMap;

use crate::models::{FileProperties, PropertyDetail, PropertyStatus, SegmentLevel, SimilarSegment};
use crate::settings::Settings;

/// Result of [`compare_texts`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextComparison {
    /// 0–100.
    pub similarity_value: f64,
    /// `similarity_value` formatted as `"xx.x%"`.
    pub similarity: String,
    pub segments: Vec<SimilarSegment>,
}

impl TextComparison {
    pub fn exceeds_threshold(&self, settings: &Settings) -> bool {
        self.similarity_value >= settings.text_similarity_threshold
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Applies the case, punctuation and whitespace switches from `settings`.
pub fn normalize(text: &str, settings: &Settings) -> String {
    let mut out: String = text
        .chars()
        .filter(|c| !(settings.ignore_punctuation && is_punctuation(*c)))
        .collect();
    if settings.ignore_case {
        out = out.to_lowercase();
    }
    if settings.ignore_whitespace {
        out = out.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    out
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace() && !c.is_control())
}

struct Word<'a> {
    original: &'a str,
    key: String,
}

/// Splits on whitespace and drops words whose key normalizes to nothing
/// (a lone dash under `ignore_punctuation`, for instance).
fn words<'a>(text: &'a str, settings: &Settings) -> Vec<Word<'a>> {
    text.split_whitespace()
        .filter_map(|original| {
            let key = normalize(original, settings);
            (!key.is_empty()).then_some(Word { original, key })
        })
        .collect()
}

/// Start positions kept per shingle. Highly repetitive text would otherwise
/// make every left position try every right position.
const MAX_CANDIDATES: usize = 64;

pub fn compare_texts(left: &str, right: &str, settings: &Settings) -> TextComparison {
    let min = settings.min_duplicate_words.max(1) as usize;
    let left_words = words(left, settings);
    let right_words = words(right, settings);

    if left_words.len() < min || right_words.len() < min {
        return TextComparison {
            similarity_value: 0.0,
            similarity: format_percent(0.0),
            segments: Vec::new(),
        };
    }

    // earliest shingle start positions on the right, keyed by the joined word keys
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for start in 0..=right_words.len() - min {
        let starts = index
            .entry(shingle(&right_words[start..start + min]))
            .or_default();
        if starts.len() < MAX_CANDIDATES {
            starts.push(start);
        }
    }

    let mut segments = Vec::new();
    let mut covered = 0usize;
    let mut i = 0usize;
    while i + min <= left_words.len() {
        let best = index
            .get(&shingle(&left_words[i..i + min]))
            .and_then(|starts| {
                starts
                    .iter()
                    .map(|&j| (j, run_length(&left_words[i..], &right_words[j..])))
                    .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            });

        match best {
            Some((j, len)) => {
                let left_run = &left_words[i..i + len];
                let right_run = &right_words[j..j + len];
                let verbatim = left_run
                    .iter()
                    .zip(right_run)
                    .filter(|(l, r)| l.original == r.original)
                    .count();
                let value = verbatim as f64 / len as f64 * 100.0;

                segments.push(SimilarSegment {
                    id: segments.len() as u64 + 1,
                    similarity: format_percent(value),
                    similarity_value: value,
                    left_content: join_original(left_run),
                    right_content: join_original(right_run),
                    left_page: format!("word {}", i + 1),
                    right_page: format!("word {}", j + 1),
                    level: level_for(len, min),
                });
                covered += len;
                i += len;
            }
            None => i += 1,
        }
    }

    let value = covered as f64 / left_words.len() as f64 * 100.0;
    TextComparison {
        similarity_value: value,
        similarity: format_percent(value),
        segments,
    }
}

fn shingle(words: &[Word<'_>]) -> String {
    words
        .iter()
        .map(|w| w.key.as_str())
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

fn run_length(left: &[Word<'_>], right: &[Word<'_>]) -> usize {
    left.iter()
        .zip(right)
        .take_while(|(l, r)| l.key == r.key)
        .count()
}

fn join_original(words: &[Word<'_>]) -> String {
    words
        .iter()
        .map(|w| w.original)
        .collect::<Vec<_>>()
        .join(" ")
}

fn level_for(len: usize, min: usize) -> SegmentLevel {
    if len >= 2 * min {
        SegmentLevel::High
    } else if len * 2 >= 3 * min {
        SegmentLevel::Medium
    } else {
        SegmentLevel::Low
    }
}

const NOT_AVAILABLE: &str = "N/A";

/// Compares the descriptive metadata of two files. File name, size and
/// content length always differ between inputs and are left out.
pub fn compare_properties(left: &FileProperties, right: &FileProperties) -> Vec<PropertyDetail> {
    const SKIPPED: [&str; 3] = ["File name", "File size", "Content length"];

    left.entries()
        .into_iter()
        .zip(right.entries())
        .filter(|((label, _), _)| !SKIPPED.contains(label))
        .map(|((label, l), (_, r))| PropertyDetail {
            name: label.to_string(),
            left_value: l.unwrap_or(NOT_AVAILABLE).to_string(),
            right_value: r.unwrap_or(NOT_AVAILABLE).to_string(),
            status: property_status(l, r),
        })
        .collect()
}

fn property_status(left: Option<&str>, right: Option<&str>) -> PropertyStatus {
    match (left, right) {
        (Some(l), Some(r)) if l == r => PropertyStatus::Match,
        (Some(l), Some(r)) if is_placeholder(l) || is_placeholder(r) => PropertyStatus::Warning,
        (Some(_), Some(_)) => PropertyStatus::Mismatch,
        _ => PropertyStatus::Warning,
    }
}

fn is_placeholder(value: &str) -> bool {
    value.starts_with("Unknown")
}
