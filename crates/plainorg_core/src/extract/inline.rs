//! Inline metadata extraction and canonical line rebuilding for batch files.
//!
//! # Responsibility
//! - Parse one `*`-marked line into content plus a raw property bag.
//! - Rebuild a validated entity into its canonical line form.
//!
//! # Invariants
//! - Symbols are matched longest-first so multi-character symbols are never
//!   shadowed by a shorter prefix.
//! - Repeated symbols accumulate through the Absent -> Scalar -> List state
//!   machine; ordering of occurrences is preserved.
//! - Lines not starting with the marker are never touched.

use crate::model::value::{PropertyBag, RawValue, Value, ValueMap};
use crate::schema::ContentClass;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Marker starting every entity line.
pub const LINE_MARKER: char = '*';

/// Metadata delimiter separating content from symbol tokens.
pub const META_DELIMITER: &str = "//";

/// Property-to-symbol table for inline metadata.
const SYMBOLS: &[(&str, &str)] = &[
    ("id", "id/"),
    ("tags", "#"),
    ("authour", "$"),
    ("creation", "~"),
    ("status", "="),
    ("assignees", "@"),
    ("priority", "!"),
    ("deadline", "%"),
    ("start", ">"),
    ("end", "<"),
    ("pattern", "^"),
];

/// Token emission order for rebuilt lines; the identity token is always last.
const TOKEN_ORDER: [&str; 10] = [
    "start",
    "authour",
    "status",
    "priority",
    "creation",
    "deadline",
    "end",
    "pattern",
    "tags",
    "assignees",
];

/// Accumulation state for one property across repeated symbol strikes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Slot {
    #[default]
    Absent,
    Scalar(String),
    List(Vec<String>),
}

impl Slot {
    /// Advances the state machine with one more struck value.
    fn strike(&mut self, value: String) {
        *self = match std::mem::take(self) {
            Slot::Absent => Slot::Scalar(value),
            Slot::Scalar(first) => Slot::List(vec![first, value]),
            Slot::List(mut items) => {
                items.push(value);
                Slot::List(items)
            }
        };
    }

    fn into_raw(self) -> Option<RawValue> {
        match self {
            Slot::Absent => None,
            Slot::Scalar(value) => Some(RawValue::Str(value)),
            Slot::List(items) => Some(RawValue::List(items)),
        }
    }
}

/// One parsed batch line: the raw bag (content included under the class's
/// content property) and any embedded identity token.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineEntity {
    pub bag: PropertyBag,
    pub embedded_id: Option<String>,
}

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // Longest symbols first, so `id/` wins over any one-character symbol
    // that happens to prefix it.
    let mut symbols: Vec<&str> = SYMBOLS.iter().map(|(_, symbol)| *symbol).collect();
    symbols.sort_by_key(|symbol| std::cmp::Reverse(symbol.len()));
    let escaped: Vec<String> = symbols.iter().map(|symbol| regex::escape(symbol)).collect();
    Regex::new(&format!(r"({})(\S+)", escaped.join("|"))).expect("token pattern must compile")
});

static TODO_CONTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\*\s*t\s*:\s*(.+?)\s*$").expect("content pattern must compile"));
static EVENT_CONTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\*\s*e\s*:\s*(.+?)\s*$").expect("content pattern must compile"));
static MARKER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*\s*\w\s*:\s*").expect("marker pattern must compile"));

fn content_pattern(class: ContentClass) -> Option<&'static Regex> {
    match class {
        ContentClass::Note => None,
        ContentClass::Todo => Some(&TODO_CONTENT),
        ContentClass::Event => Some(&EVENT_CONTENT),
    }
}

/// Whether this line holds an entity at all.
pub fn is_entity_line(line: &str) -> bool {
    line.trim_start().starts_with(LINE_MARKER)
}

/// Parses one entity line for `class`.
///
/// Content missing or a mismatched marker letter leaves the content property
/// absent; the validator reports it as a missing required property.
pub fn parse_line(line: &str, class: ContentClass) -> InlineEntity {
    let trimmed = line.trim_start();
    let (before, after) = match trimmed.split_once(META_DELIMITER) {
        Some((before, after)) => (before, after),
        None => (trimmed, ""),
    };

    let mut slots: BTreeMap<&'static str, Slot> = BTreeMap::new();

    if let Some(pattern) = content_pattern(class) {
        if let Some(captures) = pattern.captures(before) {
            let content = captures[1].trim();
            if !content.is_empty() {
                slots
                    .entry(class.content_property())
                    .or_default()
                    .strike(content.to_string());
            }
        }
    }

    for captures in TOKEN_PATTERN.captures_iter(after) {
        let symbol = captures.get(1).map_or("", |m| m.as_str());
        let value = captures.get(2).map_or("", |m| m.as_str());
        if let Some((property, _)) = SYMBOLS.iter().copied().find(|(_, s)| *s == symbol) {
            slots.entry(property).or_default().strike(value.to_string());
        }
    }

    let embedded_id = match slots.remove("id").map(Slot::into_raw) {
        Some(Some(RawValue::Str(value))) => Some(value),
        // A twice-struck identity token is ambiguous; let the resolver mint
        // or recover through the path route instead.
        _ => None,
    };

    let mut bag = PropertyBag::new();
    for (property, slot) in slots {
        if let Some(raw) = slot.into_raw() {
            bag.insert(property.to_string(), raw);
        }
    }

    InlineEntity { bag, embedded_id }
}

/// Rebuilds a validated entity into canonical line form, preserving the
/// original `* t: `-style prefix when one is present.
pub fn render_line(original: &str, class: ContentClass, values: &ValueMap, id: &str) -> String {
    let trimmed = original.trim_start();
    let prefix = match MARKER_PREFIX.find(trimmed) {
        Some(found) => found.as_str().to_string(),
        None => match class.marker_letter() {
            Some(letter) => format!("* {letter}: "),
            None => "* ".to_string(),
        },
    };

    let content = values
        .get(class.content_property())
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut tokens = Vec::new();
    for key in TOKEN_ORDER {
        let Some(value) = values.get(key) else {
            continue;
        };
        let Some((_, symbol)) = SYMBOLS.iter().copied().find(|(property, _)| *property == key) else {
            continue;
        };
        match value {
            Value::List(items) => {
                for item in items {
                    tokens.push(format!("{symbol}{item}"));
                }
            }
            scalar => tokens.push(format!("{symbol}{scalar}")),
        }
    }
    tokens.push(format!("id/{id}"));

    format!("{prefix}{content} {META_DELIMITER} {}", tokens.join(" "))
}
