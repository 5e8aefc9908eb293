//! Page-by-page PDF text via `lopdf`.

use lopdf::{Dictionary, Document, Object};

use super::ExtractError;

#[derive(Debug)]
pub struct PdfText {
    pub text: String,
    /// True page count, including pages past the cap.
    pub total_pages: usize,
    pub author: Option<String>,
    pub application: Option<String>,
}

/// Loads the document and extracts pages `1..=min(total, max_pages)`.
///
/// A page whose text cannot be decoded contributes an empty line instead of
/// failing the document.
pub fn extract(bytes: &[u8], max_pages: usize) -> Result<PdfText, ExtractError> {
    let doc = Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let pages = doc.get_pages();
    let total_pages = pages.len();

    let mut text = String::new();
    for (&number, _) in pages.iter().take(max_pages) {
        match doc.extract_text(&[number]) {
            Ok(page_text) => text.push_str(page_text.trim_end_matches('\n')),
            Err(e) => tracing::debug!(page = number, error = %e, "page text unavailable"),
        }
        text.push('\n');
    }
    let extracted = total_pages.min(max_pages);
    if total_pages > extracted {
        text.push_str(&format!(
            "\n... showing first {} of {} pages ...\n",
            extracted, total_pages
        ));
    }

    let info = info_dictionary(&doc);
    let author = info.and_then(|d| info_string(d, b"Author"));
    let application = info.and_then(|d| {
        info_string(d, b"Creator").or_else(|| info_string(d, b"Producer"))
    });

    Ok(PdfText {
        text,
        total_pages,
        author,
        application,
    })
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            let value = decode_pdf_string(bytes);
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        _ => None,
    }
}

/// UTF-16BE when the string carries a byte-order mark, otherwise treated as
/// Latin-1 compatible text.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}
