//! Paragraph text from `word/document.xml`.

use crate::errors::ExtractionError;
use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::LazyLock;

const DOCUMENT_PART: &str = "word/document.xml";

#[allow(clippy::expect_used)]
static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>|<w:p/>").expect("valid regex"));

#[allow(clippy::expect_used)]
static RUN_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab/>|<w:br\b[^>]*/>|<w:cr/>")
        .expect("valid regex")
});

#[allow(clippy::expect_used)]
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9A-Fa-f]+)|(lt|gt|quot|apos|amp));").expect("valid regex")
});

fn corrupt(reason: impl ToString) -> ExtractionError {
    ExtractionError::Corrupt {
        format: "docx",
        reason: reason.to_string(),
    }
}

/// Returns the text of every paragraph, in document order.
pub(super) fn paragraphs(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(corrupt)?
        .read_to_string(&mut xml)
        .map_err(corrupt)?;

    PARAGRAPH
        .find_iter(&xml)
        .map(|p| paragraph_text(p.as_str()))
        .collect()
}

fn paragraph_text(xml: &str) -> Result<String, ExtractionError> {
    let mut text = String::new();
    for cap in RUN_CONTENT.captures_iter(xml) {
        match cap.get(1) {
            Some(t) => text.push_str(&unescape(t.as_str())?),
            None if cap[0].starts_with("<w:tab") => text.push('\t'),
            None => text.push('\n'),
        }
    }
    Ok(text)
}

/// Decodes the predefined entities and numeric character references.
fn unescape(s: &str) -> Result<String, ExtractionError> {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for cap in ENTITY.captures_iter(s) {
        let Some(whole) = cap.get(0) else {
            continue;
        };
        out.push_str(&s[last..whole.start()]);

        let decoded = if let Some(dec) = cap.get(1) {
            dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
        } else if let Some(hex) = cap.get(2) {
            u32::from_str_radix(hex.as_str(), 16)
                .ok()
                .and_then(char::from_u32)
        } else {
            match cap.get(3).map(|m| m.as_str()) {
                Some("lt") => Some('<'),
                Some("gt") => Some('>'),
                Some("quot") => Some('"'),
                Some("apos") => Some('\''),
                Some("amp") => Some('&'),
                _ => None,
            }
        };
        let ch = decoded
            .ok_or_else(|| corrupt(format!("invalid character reference '{}'", whole.as_str())))?;
        out.push(ch);
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(out)
}
