//! Data types shared by the extractor, comparison, history and AI modules.
//!
//! Persisted shapes serialize with `camelCase` keys so stored JSON stays
//! compatible with the browser build of the tool.

use serde::{Deserialize, Serialize};

/// Metadata record produced for every parsed file.
///
/// The key set is fixed. An unsupported or unreadable file yields the
/// empty (`Default`) record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Human-formatted size, e.g. `"1.50 KB"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl FileProperties {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `(label, value)` pairs in display order.
    pub fn entries(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("File name", self.filename.as_deref()),
            ("File size", self.size.as_deref()),
            ("File type", self.file_type.as_deref()),
            ("Author", self.author.as_deref()),
            ("Last saved by", self.last_modified_by.as_deref()),
            ("Page range", self.page_range.as_deref()),
            ("Version", self.version.as_deref()),
            ("Application", self.application.as_deref()),
            ("Company", self.company.as_deref()),
            ("Content length", self.content_length.as_deref()),
            ("Created", self.created.as_deref()),
            ("Modified", self.modified.as_deref()),
        ]
    }
}

/// Output of one extraction call. Never cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileParseResult {
    pub content: String,
    pub properties: FileProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileParseResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            properties: FileProperties::default(),
            pages: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentLevel {
    High,
    Medium,
    Low,
}

/// A run of text found in both files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarSegment {
    pub id: u64,
    /// Formatted percentage, e.g. `"92.0%"`.
    pub similarity: String,
    /// 0–100.
    pub similarity_value: f64,
    pub left_content: String,
    pub right_content: String,
    pub left_page: String,
    pub right_page: String,
    pub level: SegmentLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Match,
    Mismatch,
    Warning,
}

/// One metadata field compared between two files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetail {
    pub name: String,
    pub left_value: String,
    pub right_value: String,
    pub status: PropertyStatus,
}

/// A stored comparison. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRecord {
    pub id: u64,
    pub filename: String,
    pub timestamp: String,
    pub similarity: String,
    #[serde(default)]
    pub left_file_name: String,
    #[serde(default)]
    pub right_file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_segments: Option<Vec<SimilarSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_details: Option<Vec<PropertyDetail>>,
}

/// A [`RecentRecord`] before the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub filename: String,
    pub timestamp: String,
    pub similarity: String,
    pub left_file_name: String,
    pub right_file_name: String,
    pub similar_segments: Option<Vec<SimilarSegment>>,
    pub property_details: Option<Vec<PropertyDetail>>,
}

impl NewRecord {
    /// Record for a comparison of `left` against `right`, stamped with the
    /// current local time.
    pub fn for_pair(left: &str, right: &str, similarity: impl Into<String>) -> Self {
        Self {
            filename: format!("{} vs {}", left, right),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            similarity: similarity.into(),
            left_file_name: left.to_string(),
            right_file_name: right.to_string(),
            similar_segments: None,
            property_details: None,
        }
    }

    pub fn with_id(self, id: u64) -> RecentRecord {
        RecentRecord {
            id,
            filename: self.filename,
            timestamp: self.timestamp,
            similarity: self.similarity,
            left_file_name: self.left_file_name,
            right_file_name: self.right_file_name,
            similar_segments: self.similar_segments,
            property_details: self.property_details,
        }
    }
}

/// Normalized reply from an AI vendor.
///
/// On failure `insights` and `suggestions` are empty and `error` is set;
/// callers cannot use non-empty lists as a success signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysisResult {
    pub summary: String,
    pub insights: Vec<String>,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AiAnalysisResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            summary: "AI analysis failed".to_string(),
            insights: Vec::new(),
            suggestions: Vec::new(),
            error: Some(error.into()),
        }
    }
}
