//! OOXML (zip container) helpers: body text for word-processor and
//! presentation parts, and best-effort `docProps` metadata.
//!
//! Body text uses a streaming XML reader keyed on local names, so any
//! namespace prefix works. Metadata uses loose tag matching on the raw part
//! text and never fails: a missing or garbled fragment yields `None`.

use std::collections::HashMap;
use std::io::Read;
use std::sync::OnceLock;

use quick_xml::events::Event;
use regex::Regex;

use super::ExtractError;

pub type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

pub const CORE_PROPS: &str = "docProps/core.xml";
pub const APP_PROPS: &str = "docProps/app.xml";
const DOCX_BODY: &str = "word/document.xml";
const SLIDE_PREFIX: &str = "ppt/slides/slide";

pub fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

pub fn read_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    // One byte past the limit tells "exactly at" from "over".
    entry
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 > max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Paragraphs of a part, each a list of its text runs.
///
/// Matches local names only (`p`, `t`), which WordprocessingML and DrawingML
/// share. Tabs and breaks become runs of their own. Paragraphs nested in
/// text boxes are emitted when they close, ahead of the paragraph that
/// holds them.
fn collect_paragraphs(xml: &[u8]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut paragraphs = Vec::new();
    let mut open: Vec<Vec<String>> = Vec::new();
    let mut in_text = false;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => open.push(Vec::new()),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => push_run(&mut open, "\t".to_string()),
                b"br" | b"cr" => push_run(&mut open, "\n".to_string()),
                b"p" => paragraphs.push(Vec::new()),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                push_run(&mut open, te.unescape().unwrap_or_default().into_owned());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.extend(open.pop()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

/// Runs outside any paragraph are dropped.
fn push_run(open: &mut [Vec<String>], run: String) {
    if let Some(paragraph) = open.last_mut() {
        paragraph.push(run);
    }
}

/// Plain text of a `.docx` body: one paragraph per block, blank line after each.
pub fn docx_text(bytes: &[u8], max_entry_bytes: u64) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    if archive.index_for_name(DOCX_BODY).is_none() {
        return Err(ExtractError::Ooxml(format!("{} not found", DOCX_BODY)));
    }
    let xml = read_entry_bounded(&mut archive, DOCX_BODY, max_entry_bytes)?;
    let mut out = String::new();
    for runs in collect_paragraphs(&xml)? {
        out.push_str(&runs.concat());
        out.push_str("\n\n");
    }
    Ok(out)
}

/// Slide part names sorted by slide number (`slide2` before `slide10`).
pub fn slide_names(archive: &Archive<'_>) -> Vec<String> {
    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name
                .strip_prefix(SLIDE_PREFIX)?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    numbered.sort_by_key(|(n, _)| *n);
    numbered.into_iter().map(|(_, name)| name).collect()
}

/// Extracted presentation body.
#[derive(Debug, Default)]
pub struct Presentation {
    pub text: String,
    pub total_slides: usize,
    pub metadata: PartialMetadata,
}

/// Reads up to `max_slides` slides in numeric order plus core metadata.
pub fn presentation(
    bytes: &[u8],
    max_slides: usize,
    max_entry_bytes: u64,
) -> Result<Presentation, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let names = slide_names(&archive);

    let mut text = String::new();
    for (index, name) in names.iter().take(max_slides).enumerate() {
        let xml = read_entry_bounded(&mut archive, name, max_entry_bytes)?;
        text.push_str(&format!("Slide {}\n", index + 1));
        for run in collect_paragraphs(&xml)?.into_iter().flatten() {
            if !run.trim().is_empty() {
                text.push_str(&run);
                text.push('\n');
            }
        }
        text.push('\n');
    }
    if names.len() > max_slides {
        text.push_str(&format!(
            "... showing first {} of {} slides ...\n",
            max_slides,
            names.len()
        ));
    }

    Ok(Presentation {
        text,
        total_slides: names.len(),
        metadata: document_metadata(&mut archive, max_entry_bytes),
    })
}

/// Metadata recovered from `docProps` parts. Every field is optional and
/// is merged over format defaults by the caller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartialMetadata {
    pub author: Option<String>,
    pub last_modified_by: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub pages: Option<usize>,
    pub application: Option<String>,
    pub app_version: Option<String>,
    pub company: Option<String>,
}

impl PartialMetadata {
    /// Fields set in `other` win.
    pub fn merge(mut self, other: PartialMetadata) -> Self {
        self.author = other.author.or(self.author);
        self.last_modified_by = other.last_modified_by.or(self.last_modified_by);
        self.created = other.created.or(self.created);
        self.modified = other.modified.or(self.modified);
        self.pages = other.pages.or(self.pages);
        self.application = other.application.or(self.application);
        self.app_version = other.app_version.or(self.app_version);
        self.company = other.company.or(self.company);
        self
    }
}

/// Reads one metadata part. Never fails: an absent, oversized or
/// unparsable part yields `None`.
pub fn extract_metadata_fragment(
    archive: &mut Archive<'_>,
    path: &str,
    max_entry_bytes: u64,
) -> Option<PartialMetadata> {
    archive.index_for_name(path)?;
    let raw = match read_entry_bounded(archive, path, max_entry_bytes) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(part = path, error = %e, "skipping metadata part");
            return None;
        }
    };
    let xml = String::from_utf8_lossy(&raw);

    let pages = tag_value(&xml, "Pages")
        .or_else(|| tag_value(&xml, "PageCount"))
        .and_then(|v| v.parse::<usize>().ok());

    Some(PartialMetadata {
        author: tag_value(&xml, "creator"),
        last_modified_by: tag_value(&xml, "lastModifiedBy"),
        created: tag_value(&xml, "created").map(|v| format_w3c_date(&v)),
        modified: tag_value(&xml, "modified").map(|v| format_w3c_date(&v)),
        pages,
        application: tag_value(&xml, "Application"),
        app_version: tag_value(&xml, "AppVersion"),
        company: tag_value(&xml, "Company"),
    })
}

/// `core.xml` then `app.xml`, each independently best-effort.
pub fn document_metadata(archive: &mut Archive<'_>, max_entry_bytes: u64) -> PartialMetadata {
    [CORE_PROPS, APP_PROPS]
        .into_iter()
        .filter_map(|part| extract_metadata_fragment(archive, part, max_entry_bytes))
        .fold(PartialMetadata::default(), PartialMetadata::merge)
}

/// Opens the container and reads its metadata; `None` if it is not a zip.
pub fn container_metadata(bytes: &[u8], max_entry_bytes: u64) -> Option<PartialMetadata> {
    match open_archive(bytes) {
        Ok(mut archive) => Some(document_metadata(&mut archive, max_entry_bytes)),
        Err(e) => {
            tracing::debug!(error = %e, "metadata container unreadable");
            None
        }
    }
}

const METADATA_TAGS: [&str; 9] = [
    "creator",
    "lastModifiedBy",
    "created",
    "modified",
    "Pages",
    "PageCount",
    "Application",
    "AppVersion",
    "Company",
];

/// Compiled once per process, keyed by lowercase tag name.
fn tag_patterns() -> &'static HashMap<String, Regex> {
    static PATTERNS: OnceLock<HashMap<String, Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        METADATA_TAGS
            .iter()
            .filter_map(|tag| {
                let pattern = format!(
                    r"(?is)<(?:[a-z0-9_]+:)?{tag}(?:\s[^>]*)?>([^<]+)</(?:[a-z0-9_]+:)?{tag}\s*>",
                    tag = regex::escape(tag)
                );
                Regex::new(&pattern)
                    .ok()
                    .map(|re| (tag.to_ascii_lowercase(), re))
            })
            .collect()
    })
}

/// Text of the first `<prefix:tag ...>value</prefix:tag>`, any prefix,
/// case-insensitive. Blank values count as absent, as do tags outside
/// [`METADATA_TAGS`].
fn tag_value(xml: &str, tag: &str) -> Option<String> {
    let re = tag_patterns().get(&tag.to_ascii_lowercase())?;
    let raw = re.captures(xml)?.get(1)?.as_str();
    let value = quick_xml::escape::unescape(raw)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// W3CDTF timestamps become local `YYYY-MM-DD HH:MM:SS`; anything else is
/// kept as written.
fn format_w3c_date(value: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format(super::TIMESTAMP_FORMAT)
                .to_string()
        })
        .unwrap_or_else(|_| value.to_string())
}
