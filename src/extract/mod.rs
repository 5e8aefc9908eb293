//! Multi-format text and metadata extraction.
//!
//! [`Extractor::parse`] picks a [`DocumentFormat`] from the file name's
//! extension and always returns a [`FileParseResult`]; no format lets an
//! error or panic escape.
//!
//! | Format | Body | Metadata | Bounded wait | On failure |
//! |--------|------|----------|--------------|------------|
//! | TXT | BOM-aware lossy decode | file info | none | never fails |
//! | DOCX | `word/document.xml` | `docProps` | metadata only | body: error; metadata: defaults |
//! | DOC | none | file info | none | always an error (convert to DOCX) |
//! | PDF | pages up to the cap | Info dictionary | whole load | placeholder, no error |
//! | XLSX | every sheet | `docProps` | metadata only | body: error; metadata: defaults |
//! | PPTX | slides up to the cap | `docProps` | whole load | placeholder, no error |

pub mod bounded;
pub mod ooxml;
pub mod pdf;
pub mod spreadsheet;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};

use crate::config::ExtractConfig;
use crate::models::{FileParseResult, FileProperties};
use bounded::{run_bounded, Settled};
use ooxml::PartialMetadata;

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const PDF_PLACEHOLDER: &str = "PDF content could not be extracted";
const PPTX_PLACEHOLDER: &str = "PPTX content could not be extracted\n";
const DOC_UNSUPPORTED: &str = "DOC files are not supported; convert to DOCX and retry";

/// Failures inside a single extraction routine. Never returned from
/// [`Extractor::parse`]; converted into `error` or a placeholder there.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("spreadsheet extraction failed: {0}")]
    Spreadsheet(String),
    #[error("extraction worker failed: {0}")]
    Worker(String),
}

/// Input file: name, content and the file system's modification time.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub last_modified: DateTime<Utc>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>, last_modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            last_modified,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let last_modified = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes, last_modified))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased text after the last `.`, empty when there is none.
    pub fn extension(&self) -> String {
        match self.name.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => String::new(),
        }
    }
}

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Docx,
    LegacyDoc,
    Pdf,
    Spreadsheet,
    Presentation,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" => Some(DocumentFormat::Text),
            "docx" => Some(DocumentFormat::Docx),
            "doc" => Some(DocumentFormat::LegacyDoc),
            "pdf" => Some(DocumentFormat::Pdf),
            "xlsx" | "xls" => Some(DocumentFormat::Spreadsheet),
            "pptx" | "ppt" => Some(DocumentFormat::Presentation),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentFormat::Text => "TXT text file",
            DocumentFormat::Docx => "DOCX document",
            DocumentFormat::LegacyDoc => "DOC document",
            DocumentFormat::Pdf => "PDF document",
            DocumentFormat::Spreadsheet => "XLSX spreadsheet",
            DocumentFormat::Presentation => "PPTX presentation",
        }
    }

    fn default_application(self) -> &'static str {
        match self {
            DocumentFormat::Text | DocumentFormat::Pdf => "Unknown",
            DocumentFormat::Docx | DocumentFormat::LegacyDoc => "Microsoft Word",
            DocumentFormat::Spreadsheet => "Microsoft Excel",
            DocumentFormat::Presentation => "Microsoft PowerPoint",
        }
    }
}

/// `"512 B"`, `"1.50 KB"`, `"2.00 MB"`.
pub fn format_file_size(size: u64) -> String {
    if size < 1024 {
        format!("{} B", size)
    } else if size < 1024 * 1024 {
        format!("{:.2} KB", size as f64 / 1024.0)
    } else {
        format!("{:.2} MB", size as f64 / (1024.0 * 1024.0))
    }
}

fn format_local(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}

/// Default properties for `format`, before any enrichment.
fn base_properties(file: &SourceFile, format: DocumentFormat) -> FileProperties {
    let stamp = format_local(file.last_modified);
    FileProperties {
        filename: Some(file.name.clone()),
        size: Some(format_file_size(file.size())),
        file_type: Some(format.label().to_string()),
        author: Some("Unknown author".to_string()),
        last_modified_by: Some("Unknown user".to_string()),
        page_range: Some("1".to_string()),
        version: Some("1.0".to_string()),
        application: Some(format.default_application().to_string()),
        company: Some(String::new()),
        content_length: None,
        created: Some(stamp.clone()),
        modified: Some(stamp),
    }
}

/// Applies recovered metadata over defaults. Returns the page count if
/// the metadata carried one.
fn apply_metadata(props: &mut FileProperties, meta: PartialMetadata) -> Option<usize> {
    if let Some(v) = meta.author {
        props.author = Some(v);
    }
    if let Some(v) = meta.last_modified_by {
        props.last_modified_by = Some(v);
    }
    if let Some(v) = meta.created {
        props.created = Some(v);
    }
    if let Some(v) = meta.modified {
        props.modified = Some(v);
    }
    if let Some(v) = meta.application {
        props.application = Some(v);
    }
    if let Some(v) = meta.app_version {
        props.version = Some(v);
    }
    if let Some(v) = meta.company {
        props.company = Some(v);
    }
    if let Some(pages) = meta.pages {
        props.page_range = Some(format!("1-{}", pages));
    }
    meta.pages
}

fn finish(content: String, mut properties: FileProperties, pages: Option<usize>) -> FileParseResult {
    properties.content_length = Some(content.chars().count().to_string());
    FileParseResult {
        content,
        properties,
        pages,
        error: None,
    }
}

/// Decodes plain text the way browsers read a file as UTF-8: a UTF-16 BOM
/// switches encoding, a UTF-8 BOM is dropped and bad sequences become
/// U+FFFD.
fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xff, 0xfe, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xfe, 0xff, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xef, 0xbb, 0xbf, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let chunks = bytes.chunks_exact(2);
    let dangling = !chunks.remainder().is_empty();
    let units: Vec<u16> = chunks.map(|pair| unit([pair[0], pair[1]])).collect();
    let mut text = String::from_utf16_lossy(&units);
    if dangling {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

/// Format-dispatching extractor.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    limits: ExtractConfig,
}

impl Extractor {
    pub fn new(limits: ExtractConfig) -> Self {
        Self { limits }
    }

    pub async fn parse(&self, file: &SourceFile) -> FileParseResult {
        let ext = file.extension();
        let Some(format) = DocumentFormat::from_extension(&ext) else {
            tracing::debug!(file = %file.name, "unsupported extension");
            return FileParseResult::failed(format!("unsupported file type: .{}", ext));
        };

        let result = match format {
            DocumentFormat::Text => self.parse_text(file),
            DocumentFormat::Docx => self.parse_docx(file).await,
            DocumentFormat::LegacyDoc => self.parse_legacy_doc(file),
            DocumentFormat::Pdf => self.parse_pdf(file).await,
            DocumentFormat::Spreadsheet => self.parse_spreadsheet(file).await,
            DocumentFormat::Presentation => self.parse_presentation(file).await,
        };
        tracing::debug!(
            file = %file.name,
            format = format.label(),
            bytes = result.content.len(),
            error = result.error.as_deref().unwrap_or(""),
            "parsed"
        );
        result
    }

    fn parse_text(&self, file: &SourceFile) -> FileParseResult {
        finish(
            decode_text(&file.bytes),
            base_properties(file, DocumentFormat::Text),
            None,
        )
    }

    async fn parse_docx(&self, file: &SourceFile) -> FileParseResult {
        let max_entry = self.limits.max_entry_bytes;
        let bytes = file.bytes.clone();
        let body = tokio::task::spawn_blocking(move || ooxml::docx_text(&bytes, max_entry))
            .await
            .unwrap_or_else(|e| Err(ExtractError::Worker(e.to_string())));
        let content = match body {
            Ok(text) => text,
            Err(e) => return FileParseResult::failed(format!("failed to parse DOCX file: {}", e)),
        };

        let mut props = base_properties(file, DocumentFormat::Docx);
        let mut pages = None;
        if let Some(meta) = self
            .enrich(file, "docx metadata", self.limits.docx_timeout())
            .await
        {
            pages = apply_metadata(&mut props, meta);
        }
        finish(content, props, pages)
    }

    fn parse_legacy_doc(&self, file: &SourceFile) -> FileParseResult {
        FileParseResult {
            content: String::new(),
            properties: base_properties(file, DocumentFormat::LegacyDoc),
            pages: None,
            error: Some(DOC_UNSUPPORTED.to_string()),
        }
    }

    async fn parse_pdf(&self, file: &SourceFile) -> FileParseResult {
        let bytes = file.bytes.clone();
        let max_pages = self.limits.pdf_max_pages;
        let outcome = run_bounded("pdf load", self.limits.pdf_timeout(), move || {
            pdf::extract(&bytes, max_pages)
        })
        .await;

        let mut props = base_properties(file, DocumentFormat::Pdf);
        match outcome {
            Settled::Completed(Ok(doc)) => {
                props.page_range = Some(format!("1-{}", doc.total_pages));
                if let Some(author) = doc.author {
                    props.author = Some(author);
                }
                if let Some(app) = doc.application {
                    props.application = Some(app);
                }
                finish(doc.text, props, Some(doc.total_pages))
            }
            Settled::Completed(Err(e)) => {
                tracing::warn!(file = %file.name, error = %e, "PDF unreadable, using placeholder");
                finish(PDF_PLACEHOLDER.to_string(), props, None).with_zero_length()
            }
            Settled::TimedOut | Settled::Panicked => {
                finish(PDF_PLACEHOLDER.to_string(), props, None).with_zero_length()
            }
        }
    }

    async fn parse_spreadsheet(&self, file: &SourceFile) -> FileParseResult {
        let bytes = file.bytes.clone();
        let body = tokio::task::spawn_blocking(move || spreadsheet::workbook_text(&bytes))
            .await
            .unwrap_or_else(|e| Err(ExtractError::Worker(e.to_string())));
        let content = match body {
            Ok(text) => text,
            Err(e) => return FileParseResult::failed(format!("failed to parse XLSX file: {}", e)),
        };

        let mut props = base_properties(file, DocumentFormat::Spreadsheet);
        if let Some(meta) = self
            .enrich(file, "xlsx metadata", self.limits.xlsx_timeout())
            .await
        {
            // sheet workbooks report no page count worth showing
            apply_metadata(&mut props, PartialMetadata { pages: None, ..meta });
        }
        finish(content, props, None)
    }

    async fn parse_presentation(&self, file: &SourceFile) -> FileParseResult {
        let bytes = file.bytes.clone();
        let max_slides = self.limits.pptx_max_slides;
        let max_entry = self.limits.max_entry_bytes;
        let outcome = run_bounded("pptx load", self.limits.pptx_timeout(), move || {
            ooxml::presentation(&bytes, max_slides, max_entry)
        })
        .await;

        let mut props = base_properties(file, DocumentFormat::Presentation);
        match outcome {
            Settled::Completed(Ok(pres)) => {
                apply_metadata(&mut props, PartialMetadata { pages: None, ..pres.metadata });
                if pres.total_slides > 0 {
                    props.page_range = Some(format!("1-{}", pres.total_slides));
                }
                finish(pres.text, props, None)
            }
            Settled::Completed(Err(e)) => {
                tracing::warn!(file = %file.name, error = %e, "PPTX unreadable, using placeholder");
                finish(PPTX_PLACEHOLDER.to_string(), props, None)
            }
            Settled::TimedOut | Settled::Panicked => {
                finish(PPTX_PLACEHOLDER.to_string(), props, None)
            }
        }
    }

    /// Best-effort `docProps` read under a bounded wait. `None` means keep
    /// the defaults.
    async fn enrich(
        &self,
        file: &SourceFile,
        label: &'static str,
        limit: std::time::Duration,
    ) -> Option<PartialMetadata> {
        let bytes = file.bytes.clone();
        let max_entry = self.limits.max_entry_bytes;
        run_bounded(label, limit, move || ooxml::container_metadata(&bytes, max_entry))
            .await
            .completed()
            .flatten()
    }
}

impl FileParseResult {
    fn with_zero_length(mut self) -> Self {
        self.properties.content_length = Some("0".to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(name: &str, bytes: &[u8]) -> SourceFile {
        SourceFile::new(
            name,
            bytes.to_vec(),
            Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
        )
    }

    #[test]
    fn extension_dispatch_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("DOCX"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("Xls"), Some(DocumentFormat::Spreadsheet));
        assert_eq!(DocumentFormat::from_extension("ppt"), Some(DocumentFormat::Presentation));
        assert_eq!(DocumentFormat::from_extension("odt"), None);
        assert_eq!(file("a.b.PDF", b"").extension(), "pdf");
        assert_eq!(file("noext", b"").extension(), "");
    }

    #[test]
    fn file_sizes_are_human_formatted() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2.00 MB");
    }

    #[tokio::test]
    async fn unsupported_extension_has_empty_properties() {
        let res = Extractor::default().parse(&file("image.png", b"\x89PNG")).await;
        assert!(res.content.is_empty());
        assert!(res.properties.is_empty());
        assert!(res.error.unwrap().contains("unsupported file type"));
    }

    #[tokio::test]
    async fn text_file_reports_length_and_defaults() {
        let res = Extractor::default()
            .parse(&file("notes.TXT", "\u{feff}héllo".as_bytes()))
            .await;
        assert_eq!(res.content, "héllo");
        assert_eq!(res.error, None);
        assert_eq!(res.properties.content_length.as_deref(), Some("5"));
        assert_eq!(res.properties.file_type.as_deref(), Some("TXT text file"));
        assert_eq!(res.properties.author.as_deref(), Some("Unknown author"));
    }

    #[tokio::test]
    async fn stray_bytes_in_text_are_replaced() {
        let res = Extractor::default().parse(&file("latin1.txt", b"caf\xe9 ok")).await;
        assert_eq!(res.error, None);
        assert_eq!(res.content, "caf\u{fffd} ok");
        assert_eq!(res.properties.content_length.as_deref(), Some("6"));
    }

    #[tokio::test]
    async fn utf16_text_follows_its_bom() {
        let mut le = vec![0xff, 0xfe];
        le.extend("hello".encode_utf16().flat_map(u16::to_le_bytes));
        let res = Extractor::default().parse(&file("notepad.txt", &le)).await;
        assert_eq!(res.error, None);
        assert_eq!(res.content, "hello");

        let mut be = vec![0xfe, 0xff];
        be.extend("héllo".encode_utf16().flat_map(u16::to_be_bytes));
        be.push(0x00);
        let res = Extractor::default().parse(&file("be.txt", &be)).await;
        assert_eq!(res.content, "héllo\u{fffd}");
    }

    #[tokio::test]
    async fn legacy_doc_always_errors_with_basic_properties() {
        let res = Extractor::default().parse(&file("old.doc", b"\xd0\xcf\x11\xe0")).await;
        assert!(res.content.is_empty());
        assert_eq!(res.error.as_deref(), Some(DOC_UNSUPPORTED));
        assert_eq!(res.properties.filename.as_deref(), Some("old.doc"));
        assert_eq!(res.properties.size.as_deref(), Some("4 B"));
    }

    #[tokio::test]
    async fn corrupt_inputs_never_escape() {
        let ex = Extractor::default();
        for name in ["x.txt", "x.docx", "x.doc", "x.pdf", "x.xlsx", "x.pptx"] {
            let _ = ex.parse(&file(name, b"PK\x03\x04 truncated")).await;
        }

        let pdf = ex.parse(&file("x.pdf", b"%PDF-1.4 truncated")).await;
        assert_eq!(pdf.content, PDF_PLACEHOLDER);
        assert_eq!(pdf.error, None);
        assert_eq!(pdf.properties.content_length.as_deref(), Some("0"));

        let pptx = ex.parse(&file("x.pptx", b"garbage")).await;
        assert_eq!(pptx.content, PPTX_PLACEHOLDER);
        assert_eq!(pptx.error, None);

        let docx = ex.parse(&file("x.docx", b"garbage")).await;
        assert!(docx.error.unwrap().starts_with("failed to parse DOCX file"));

        let xlsx = ex.parse(&file("x.xlsx", b"garbage")).await;
        assert!(xlsx.error.unwrap().starts_with("failed to parse XLSX file"));
    }
}
