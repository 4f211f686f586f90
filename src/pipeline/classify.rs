//! Classification parsing: free-text model answer → [`ClassificationRecord`].
//!
//! The model is asked for three `KEY: value` lines (see
//! [`crate::prompts::CLASSIFICATION_PROMPT`]) but nothing forces it to comply.
//! Parsing is therefore total: missing keys fall back to defaults and a type
//! outside [`DocumentType::ALL`] becomes [`DocumentType::Other`].

use crate::output::{ClassificationRecord, Confidence, DocumentType};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Type,
    Confidence,
    Description,
}

/// Recognised prefixes, uppercase, without the colon. Spanish variants are
/// accepted because the model often answers in the document's language.
const KEYS: [(&str, Key); 6] = [
    ("TYPE", Key::Type),
    ("TIPO", Key::Type),
    ("CONFIDENCE", Key::Confidence),
    ("CONFIANZA", Key::Confidence),
    ("DESCRIPTION", Key::Description),
    ("DESCRIPCIÓN", Key::Description),
];

/// Parse a raw classifier answer. Never fails.
///
/// * Keys match case-insensitively at the start of a line; the value is
///   everything after the first colon, trimmed. Whitespace between the key
///   and its colon is tolerated (`TYPE : Invoice`).
/// * A key seen twice keeps its last value.
/// * `DESCRIPTION` continues over the following lines until a blank line or
///   another key. A continuation line starting with `\` has that backslash
///   removed; [`escape_continuation`] produces such lines.
/// * Without a description line the whole raw input is the description.
///
/// The description is always normalised the same way (trailing whitespace
/// dropped per line, outer whitespace trimmed), so parsing a rendered record
/// gives the record back.
pub fn parse(raw: &str) -> ClassificationRecord {
    let mut doc_type: Option<&str> = None;
    let mut confidence: Option<&str> = None;
    let mut description: Option<Vec<&str>> = None;
    let mut in_description = false;

    for line in raw.lines() {
        match split_key(line) {
            Some((Key::Type, value)) => {
                doc_type = Some(value);
                in_description = false;
            }
            Some((Key::Confidence, value)) => {
                confidence = Some(value);
                in_description = false;
            }
            Some((Key::Description, value)) => {
                description = Some(vec![value]);
                in_description = true;
            }
            None if line.trim().is_empty() => in_description = false,
            None if in_description => {
                if let Some(lines) = description.as_mut() {
                    lines.push(unescape_continuation(line));
                }
            }
            None => {}
        }
    }

    let description = match description {
        Some(lines) => normalise_description(lines),
        None => normalise_description(raw.trim().lines()),
    };

    ClassificationRecord {
        document_type: doc_type
            .and_then(DocumentType::from_label)
            .unwrap_or(DocumentType::Other),
        confidence: confidence.and_then(Confidence::parse).unwrap_or_default(),
        description,
    }
}

/// Make a description continuation line safe to emit after `DESCRIPTION:`.
///
/// Lines that [`parse`] would read as a key, as the end of the description
/// (blank) or as already escaped get a leading `\`.
pub fn escape_continuation(line: &str) -> Cow<'_, str> {
    if split_key(line).is_some() || line.trim().is_empty() || line.starts_with('\\') {
        Cow::Owned(format!("\\{line}"))
    } else {
        Cow::Borrowed(line)
    }
}

fn unescape_continuation(line: &str) -> &str {
    line.strip_prefix('\\').unwrap_or(line)
}

fn normalise_description<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    lines
        .into_iter()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn split_key(line: &str) -> Option<(Key, &str)> {
    let line = line.trim_start();
    let (head, value) = line.split_once(':')?;
    let head = head.trim().to_uppercase();
    let head = if head == "DESCRIPCION" {
        "DESCRIPCIÓN".to_string()
    } else {
        head
    };
    KEYS.iter()
        .find(|(name, _)| *name == head)
        .map(|&(_, key)| (key, value.trim()))
}
