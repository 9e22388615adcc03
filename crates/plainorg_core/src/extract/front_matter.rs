//! Front-matter extraction and canonical rendering for note files.
//!
//! # Responsibility
//! - Split a note file into its metadata block and body.
//! - Parse `key: value` metadata lines into a raw property bag.
//! - Render a validated note back into canonical front-matter form.
//!
//! # Invariants
//! - Body text survives rewrites byte-for-byte apart from leading blank-line
//!   trimming.
//! - An opening delimiter without a closing delimiter is a parse failure,
//!   never silently treated as body text.
//! - Rendering emits only non-null declared keys, in a fixed order.

use crate::model::value::{PropertyBag, RawValue, ValueMap};
use crate::schema::{self, ContentClass};
use crate::validate::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Front-matter delimiter line.
const DELIMITER: &str = "---";

/// Canonical key order for rendered note metadata; `id` is always last.
const KEY_ORDER: [&str; 5] = ["title", "description", "tags", "authour", "creation"];

/// A note file split into its optional metadata block and its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Document<'a> {
    /// Metadata block content, delimiters excluded.
    pub front: Option<&'a str>,
    /// Everything after the closing delimiter (or the whole file).
    pub body: &'a str,
}

/// Splits a note file into front matter and body.
///
/// # Errors
/// Returns a parse failure when the file opens a metadata block that never
/// closes.
pub fn split_document(text: &str) -> Result<Document<'_>, ValidationError> {
    let after_open = match text.strip_prefix("---\n") {
        Some(rest) => rest,
        None => {
            if text == DELIMITER {
                return Err(unterminated());
            }
            return Ok(Document {
                front: None,
                body: text,
            });
        }
    };

    // Closing delimiter is a line consisting of exactly `---`.
    if let Some(rest) = after_open.strip_prefix("---\n") {
        return Ok(Document {
            front: Some(""),
            body: rest,
        });
    }
    if after_open == DELIMITER {
        return Ok(Document {
            front: Some(""),
            body: "",
        });
    }
    if let Some(idx) = after_open.find("\n---\n") {
        return Ok(Document {
            front: Some(&after_open[..idx]),
            body: &after_open[idx + 5..],
        });
    }
    if let Some(front) = after_open.strip_suffix("\n---") {
        return Ok(Document {
            front: Some(front),
            body: "",
        });
    }

    Err(unterminated())
}

fn unterminated() -> ValidationError {
    ValidationError::Parse {
        reason: "front matter block is never closed".to_string(),
    }
}

static META_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:]+)\s*:\s*(.*)$").expect("meta line pattern must compile"));

/// Parses a metadata block into a raw bag, admitting only keys declared for
/// `class` (plus `id`).
pub fn parse_front(block: &str, class: ContentClass) -> PropertyBag {
    let mut bag = PropertyBag::new();

    for raw_line in block.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(captures) = META_LINE.captures(line) else {
            continue;
        };
        let key = captures[1].trim().to_lowercase();
        let text = captures[2].trim();

        if !schema::is_declared(&key, class) {
            continue;
        }

        let value = if text.starts_with('[') && text.ends_with(']') {
            RawValue::List(parse_inline_list(&text[1..text.len() - 1]))
        } else {
            parse_scalar(text)
        };
        bag.insert(key, value);
    }

    bag
}

fn parse_inline_list(inner: &str) -> Vec<String> {
    inner
        .split(',')
        .map(|part| strip_quotes(part.trim()).to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn strip_quotes(text: &str) -> &str {
    if text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')))
    {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

static INT_SCALAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+$").expect("int pattern must compile"));
static FLOAT_SCALAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+\.\d+$").expect("float pattern must compile"));

fn parse_scalar(text: &str) -> RawValue {
    if INT_SCALAR.is_match(text) {
        if let Ok(value) = text.parse::<i64>() {
            return RawValue::Int(value);
        }
    }
    if FLOAT_SCALAR.is_match(text) {
        if let Ok(value) = text.parse::<f64>() {
            return RawValue::Float(value);
        }
    }
    match text.to_ascii_lowercase().as_str() {
        "true" => return RawValue::Bool(true),
        "false" => return RawValue::Bool(false),
        "null" | "none" | "~" => return RawValue::Null,
        _ => {}
    }
    RawValue::Str(strip_quotes(text).to_string())
}

/// Renders a validated note into its canonical on-disk text.
pub fn render(values: &ValueMap, id: &str, body: &str) -> String {
    let mut lines = Vec::new();
    for key in KEY_ORDER {
        if let Some(value) = values.get(key) {
            lines.push(format!("{key}: {value}"));
        }
    }
    lines.push(format!("id: {id}"));

    format!(
        "---\n{}\n---\n\n{}",
        lines.join("\n"),
        body.trim_start_matches('\n')
    )
}
