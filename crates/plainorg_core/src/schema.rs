//! Declarative property schema shared by all content classes.
//!
//! # Responsibility
//! - Define the single schema table consulted by both extractors and the
//!   validator: name, applicable classes, cardinality, value type, format
//!   pattern, default.
//! - Map content classes to file suffixes, index tables, and line markers.
//!
//! # Invariants
//! - Every `Defaultable` property carries a default.
//! - Format patterns compile once and are anchored full-match rules.
//! - The `id` property is not part of this table; it is owned by the
//!   identity resolver and exempt from validation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Timestamp format accepted for date-valued properties: a `YYYYMMDD` day
/// with an optional `THHMM` or `THHMMSS` time part.
pub const STAMP_PATTERN: &str = r"^\d{8}(?:T\d{4}(?:\d{2})?)?$";

/// Strict form with a mandatory time part, as produced by the system itself.
pub const STRICT_STAMP_PATTERN: &str = r"^\d{8}T\d{4}(?:\d{2})?$";

/// Accepted status vocabulary for todos and events.
pub const STATUS_PATTERN: &str =
    r"(?i)^(todo|inprogress|done|dependent|blocked|redundant|cancelled|unknown)$";

/// Recurrence pattern syntax for events. Checked only; occurrence expansion
/// lives outside the reconciliation core.
pub const RECURRENCE_PATTERN: &str =
    r"^(?:\.)?(?:\d+[ymwdhn])+(?:@[^@~]+)*(?:~[^@~]+)*(?:\+\d+(?:[ymwdhn])?)?$";

/// The three content classes held by a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    /// Single-entity front-matter files.
    Note,
    /// Line-oriented todo batch files.
    Todo,
    /// Line-oriented event batch files.
    Event,
}

impl ContentClass {
    pub const ALL: [ContentClass; 3] = [ContentClass::Note, ContentClass::Todo, ContentClass::Event];

    /// Recognized file suffixes for this class.
    pub fn suffixes(self) -> &'static [&'static str] {
        match self {
            Self::Note => &[".txt", ".nt"],
            Self::Todo => &[".td"],
            Self::Event => &[".ev"],
        }
    }

    /// Index table holding this class's rows.
    pub fn table(self) -> &'static str {
        match self {
            Self::Note => "notes",
            Self::Todo => "todos",
            Self::Event => "events",
        }
    }

    /// Name of the property carrying the entity's primary text.
    pub fn content_property(self) -> &'static str {
        match self {
            Self::Note => "title",
            Self::Todo => "todo",
            Self::Event => "event",
        }
    }

    /// Marker letter used by inline lines (`* t:` / `* e:`).
    pub fn marker_letter(self) -> Option<char> {
        match self {
            Self::Note => None,
            Self::Todo => Some('t'),
            Self::Event => Some('e'),
        }
    }

    /// Whether entities of this class live many-per-file.
    pub fn is_batch(self) -> bool {
        !matches!(self, Self::Note)
    }
}

impl Display for ContentClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Note => "note",
            Self::Todo => "todo",
            Self::Event => "event",
        };
        write!(f, "{name}")
    }
}

/// Presence policy for a schema property within its applicable classes.
///
/// Not-applicable is not a variant: it is the derived state of a property
/// consulted for a class outside its `classes` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Absence is an error.
    Required,
    /// Absence is filled from the property default.
    Defaultable,
    /// Absence skips the remaining validation stages.
    NotRequired,
    /// The value is system-managed; user input is never trusted.
    Automatic,
}

/// Declared value type of a schema property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Int,
    StrList,
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Str => "string",
            Self::Int => "integer",
            Self::StrList => "list of strings",
        };
        write!(f, "{name}")
    }
}

/// Default applied to an absent defaultable property. Deferred variants are
/// resolved at validation time, not at table construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Str(&'static str),
    Int(i64),
    StrList(&'static [&'static str]),
    /// Current timestamp in strict stamp form.
    NowStamp,
    /// The configured user's display name.
    ConfigUser,
    /// One-element list of the configured user's display name.
    ConfigUserList,
}

/// One row of the declarative schema table.
#[derive(Debug)]
pub struct SchemaProperty {
    pub name: &'static str,
    pub classes: &'static [ContentClass],
    pub cardinality: Cardinality,
    pub value_type: ValueType,
    pub pattern: Option<Regex>,
    pub default: Option<DefaultValue>,
}

impl SchemaProperty {
    /// Whether this property is declared for `class`.
    pub fn applies_to(&self, class: ContentClass) -> bool {
        self.classes.contains(&class)
    }
}

const ALL_CLASSES: &[ContentClass] = &ContentClass::ALL;
const BATCH_CLASSES: &[ContentClass] = &[ContentClass::Todo, ContentClass::Event];
const NOTE_ONLY: &[ContentClass] = &[ContentClass::Note];
const TODO_ONLY: &[ContentClass] = &[ContentClass::Todo];
const EVENT_ONLY: &[ContentClass] = &[ContentClass::Event];

static SCHEMA: Lazy<Vec<SchemaProperty>> = Lazy::new(|| {
    let rule = |pattern: &str| Some(Regex::new(pattern).expect("schema pattern must compile"));
    vec![
        SchemaProperty {
            name: "todo",
            classes: TODO_ONLY,
            cardinality: Cardinality::Required,
            value_type: ValueType::Str,
            pattern: rule(".*"),
            default: None,
        },
        SchemaProperty {
            name: "event",
            classes: EVENT_ONLY,
            cardinality: Cardinality::Required,
            value_type: ValueType::Str,
            pattern: rule(".*"),
            default: None,
        },
        SchemaProperty {
            name: "tags",
            classes: ALL_CLASSES,
            cardinality: Cardinality::Defaultable,
            value_type: ValueType::StrList,
            pattern: rule(r"^\S*$"),
            default: Some(DefaultValue::StrList(&["general"])),
        },
        SchemaProperty {
            name: "authour",
            classes: ALL_CLASSES,
            cardinality: Cardinality::Defaultable,
            value_type: ValueType::Str,
            pattern: rule(".*"),
            default: Some(DefaultValue::ConfigUser),
        },
        SchemaProperty {
            name: "creation",
            classes: ALL_CLASSES,
            cardinality: Cardinality::Automatic,
            value_type: ValueType::Str,
            pattern: rule(STAMP_PATTERN),
            default: None,
        },
        SchemaProperty {
            name: "status",
            classes: BATCH_CLASSES,
            cardinality: Cardinality::Defaultable,
            value_type: ValueType::Str,
            pattern: rule(STATUS_PATTERN),
            default: Some(DefaultValue::Str("todo")),
        },
        SchemaProperty {
            name: "assignees",
            classes: BATCH_CLASSES,
            cardinality: Cardinality::Defaultable,
            value_type: ValueType::StrList,
            pattern: rule(".*"),
            default: Some(DefaultValue::ConfigUserList),
        },
        SchemaProperty {
            name: "priority",
            classes: BATCH_CLASSES,
            cardinality: Cardinality::Defaultable,
            value_type: ValueType::Int,
            pattern: None,
            default: Some(DefaultValue::Int(3)),
        },
        SchemaProperty {
            name: "title",
            classes: NOTE_ONLY,
            cardinality: Cardinality::Defaultable,
            value_type: ValueType::Str,
            pattern: rule(".*"),
            default: Some(DefaultValue::NowStamp),
        },
        SchemaProperty {
            name: "description",
            classes: NOTE_ONLY,
            cardinality: Cardinality::NotRequired,
            value_type: ValueType::Str,
            pattern: rule(".*"),
            default: None,
        },
        SchemaProperty {
            name: "deadline",
            classes: TODO_ONLY,
            cardinality: Cardinality::NotRequired,
            value_type: ValueType::Str,
            pattern: rule(STAMP_PATTERN),
            default: None,
        },
        SchemaProperty {
            name: "start",
            classes: EVENT_ONLY,
            cardinality: Cardinality::Required,
            value_type: ValueType::Str,
            pattern: rule(STAMP_PATTERN),
            default: None,
        },
        SchemaProperty {
            name: "pattern",
            classes: EVENT_ONLY,
            cardinality: Cardinality::NotRequired,
            value_type: ValueType::Str,
            pattern: rule(RECURRENCE_PATTERN),
            default: None,
        },
        SchemaProperty {
            name: "end",
            classes: EVENT_ONLY,
            cardinality: Cardinality::NotRequired,
            value_type: ValueType::Str,
            pattern: rule(STAMP_PATTERN),
            default: None,
        },
    ]
});

/// The full schema table.
pub fn schema() -> &'static [SchemaProperty] {
    &SCHEMA
}

/// Looks up one property by name.
pub fn property(name: &str) -> Option<&'static SchemaProperty> {
    SCHEMA.iter().find(|prop| prop.name == name)
}

/// Whether `key` is a declared property for `class` (or the identity key,
/// which every class carries).
pub fn is_declared(key: &str, class: ContentClass) -> bool {
    key == "id" || property(key).is_some_and(|prop| prop.applies_to(class))
}
