//! Three-stage schema validation pipeline.
//!
//! # Responsibility
//! - Validate one raw property bag against the schema: cardinality, then
//!   type, then format, per property.
//! - Materialize defaults and the system-managed `creation` stamp.
//!
//! # Invariants
//! - Stages run in order and short-circuit per property; a failed property
//!   never hides failures on other properties of the same entity.
//! - Defaults pass back through the same type/format stages as user input,
//!   so a validated map re-validates to itself.
//! - User input is never trusted for automatic properties.

use crate::model::value::{PropertyBag, RawValue, Value, ValueMap};
use crate::schema::{self, Cardinality, ContentClass, DefaultValue, SchemaProperty, ValueType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One entity-local validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required property was absent.
    RequiredMissing {
        property: &'static str,
        class: ContentClass,
    },
    /// A property was supplied for a class it does not apply to.
    NotApplicable {
        property: &'static str,
        class: ContentClass,
    },
    /// A value could not be coerced to its declared type.
    Type {
        property: &'static str,
        expected: ValueType,
        actual: &'static str,
        value: String,
    },
    /// A correctly-typed value failed its declared format pattern.
    Format {
        property: &'static str,
        value: String,
        pattern: String,
    },
    /// Structurally malformed metadata (unterminated block, unreadable file).
    Parse { reason: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequiredMissing { property, class } => {
                write!(f, "{class} entries require property `{property}`")
            }
            Self::NotApplicable { property, class } => {
                write!(f, "property `{property}` does not apply to {class} entries")
            }
            Self::Type {
                property,
                expected,
                actual,
                value,
            } => write!(
                f,
                "`{property}`: expected {expected}, got {actual}: {value}"
            ),
            Self::Format {
                property,
                value,
                pattern,
            } => write!(
                f,
                "`{property}`: value `{value}` must match format `{pattern}`"
            ),
            Self::Parse { reason } => write!(f, "{reason}"),
        }
    }
}

impl Error for ValidationError {}

/// Per-entity validation inputs beyond the bag itself.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub class: ContentClass,
    /// Configured user display name; source of deferred defaults.
    pub user: &'a str,
    /// Previously persisted `creation` value for this entity, if any.
    pub persisted_creation: Option<&'a str>,
}

/// Validates every schema property against `raw` for the context's class.
///
/// Returns the validated, defaulted map alongside every collected failure.
/// The map only contains properties that passed all stages; the entity is
/// valid exactly when the failure list is empty.
pub fn validate_bag(
    raw: &PropertyBag,
    ctx: &ValidationContext<'_>,
) -> (ValueMap, Vec<ValidationError>) {
    let mut values = ValueMap::new();
    let mut failures = Vec::new();

    for prop in schema::schema() {
        let supplied = raw.get(prop.name).filter(|value| is_present(value));

        if !prop.applies_to(ctx.class) {
            if supplied.is_some() {
                failures.push(ValidationError::NotApplicable {
                    property: prop.name,
                    class: ctx.class,
                });
            }
            continue;
        }

        // Stage 1: cardinality.
        let effective: RawValue = match prop.cardinality {
            Cardinality::Automatic => RawValue::Str(auto_creation(
                supplied.map(ToString::to_string).as_deref(),
                ctx.persisted_creation,
                &now_stamp(),
            )),
            Cardinality::Required => match supplied {
                Some(value) => value.clone(),
                None => {
                    failures.push(ValidationError::RequiredMissing {
                        property: prop.name,
                        class: ctx.class,
                    });
                    continue;
                }
            },
            Cardinality::Defaultable => match supplied {
                Some(value) => value.clone(),
                None => match prop.default {
                    Some(default) => resolve_default(default, ctx.user),
                    None => continue,
                },
            },
            Cardinality::NotRequired => match supplied {
                Some(value) => value.clone(),
                None => continue,
            },
        };

        // Stage 2: type.
        let typed = match coerce(prop, &effective) {
            Ok(value) => value,
            Err(err) => {
                failures.push(err);
                continue;
            }
        };

        // Stage 3: format.
        if let Err(err) = check_format(prop, &typed) {
            failures.push(err);
            continue;
        }

        values.insert(prop.name.to_string(), typed);
    }

    (values, failures)
}

/// Current timestamp in the strict stamp form.
pub fn now_stamp() -> String {
    chrono::Local::now().format("%Y%m%dT%H%M%S").to_string()
}

static STRICT_STAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(schema::STRICT_STAMP_PATTERN).expect("stamp pattern must compile"));

/// Resolves the system-managed `creation` value.
///
/// A persisted value is reused when it matches the strict stamp form and
/// regenerated when it does not; a file-only value is used as-is (the format
/// stage still checks it); with neither, a fresh stamp is issued.
fn auto_creation(file_value: Option<&str>, persisted: Option<&str>, now: &str) -> String {
    match persisted {
        Some(persisted) if STRICT_STAMP.is_match(persisted) => persisted.to_string(),
        Some(_) => now.to_string(),
        None => match file_value {
            Some(value) => value.to_string(),
            None => now.to_string(),
        },
    }
}

/// Absence rules: explicit nulls, empty scalars, and empty lists all count
/// as "not supplied" for cardinality purposes.
fn is_present(value: &RawValue) -> bool {
    match value {
        RawValue::Null => false,
        RawValue::Str(text) => !text.is_empty(),
        RawValue::List(items) => !items.is_empty(),
        _ => true,
    }
}

fn resolve_default(default: DefaultValue, user: &str) -> RawValue {
    match default {
        DefaultValue::Str(text) => RawValue::Str(text.to_string()),
        DefaultValue::Int(value) => RawValue::Int(value),
        DefaultValue::StrList(items) => {
            RawValue::List(items.iter().map(|item| item.to_string()).collect())
        }
        DefaultValue::NowStamp => RawValue::Str(now_stamp()),
        DefaultValue::ConfigUser => RawValue::Str(user.to_string()),
        DefaultValue::ConfigUserList => RawValue::List(vec![user.to_string()]),
    }
}

fn coerce(prop: &SchemaProperty, raw: &RawValue) -> Result<Value, ValidationError> {
    let mismatch = || ValidationError::Type {
        property: prop.name,
        expected: prop.value_type,
        actual: raw.type_name(),
        value: raw.to_string(),
    };

    match (prop.value_type, raw) {
        (ValueType::Str, RawValue::Str(text)) => Ok(Value::Str(text.clone())),
        (ValueType::Str, RawValue::Int(value)) => Ok(Value::Str(value.to_string())),
        (ValueType::Str, RawValue::Float(value)) => Ok(Value::Str(value.to_string())),
        (ValueType::Str, RawValue::Bool(value)) => Ok(Value::Str(value.to_string())),
        (ValueType::Int, RawValue::Int(value)) => Ok(Value::Int(*value)),
        (ValueType::Int, RawValue::Float(value)) => Ok(Value::Int(*value as i64)),
        (ValueType::Int, RawValue::Str(text)) => {
            text.trim().parse::<i64>().map(Value::Int).map_err(|_| mismatch())
        }
        (ValueType::StrList, RawValue::List(items)) => Ok(Value::List(items.clone())),
        // A bare scalar offered to a list type becomes a one-element list.
        (ValueType::StrList, RawValue::Str(text)) => Ok(Value::List(vec![text.clone()])),
        _ => Err(mismatch()),
    }
}

fn check_format(prop: &SchemaProperty, value: &Value) -> Result<(), ValidationError> {
    let Some(pattern) = prop.pattern.as_ref() else {
        return Ok(());
    };

    let failure = |value: &str| ValidationError::Format {
        property: prop.name,
        value: value.to_string(),
        pattern: pattern.as_str().to_string(),
    };

    match value {
        Value::Str(text) => {
            if !pattern.is_match(text) {
                return Err(failure(text));
            }
        }
        Value::List(items) => {
            if let Some(bad) = items.iter().find(|item| !pattern.is_match(item)) {
                return Err(failure(bad));
            }
        }
        // Typed non-text values have no independent format dimension.
        Value::Int(_) => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{auto_creation, validate_bag, ValidationContext, ValidationError};
    use crate::model::value::{PropertyBag, RawValue, Value};
    use crate::schema::ContentClass;

    fn ctx(class: ContentClass) -> ValidationContext<'static> {
        ValidationContext {
            class,
            user: "Ada Lovelace",
            persisted_creation: None,
        }
    }

    #[test]
    fn auto_creation_trusts_only_well_formed_persisted_values() {
        let now = "20260101T090000";
        assert_eq!(auto_creation(None, None, now), now);
        assert_eq!(
            auto_creation(None, Some("20250101T120000"), now),
            "20250101T120000"
        );
        assert_eq!(auto_creation(None, Some("yesterday"), now), now);
        assert_eq!(
            auto_creation(Some("20250101T120000"), Some("garbled"), now),
            now
        );
        assert_eq!(
            auto_creation(Some("20240606T060000"), None, now),
            "20240606T060000"
        );
    }

    #[test]
    fn empty_values_count_as_absent() {
        let mut raw = PropertyBag::new();
        raw.insert("todo".to_string(), RawValue::Str("write tests".to_string()));
        raw.insert("tags".to_string(), RawValue::List(Vec::new()));

        let (values, failures) = validate_bag(&raw, &ctx(ContentClass::Todo));
        assert!(failures.is_empty(), "{failures:?}");
        assert_eq!(
            values.get("tags"),
            Some(&Value::List(vec!["general".to_string()]))
        );
    }

    #[test]
    fn scalar_offered_to_list_type_becomes_singleton() {
        let mut raw = PropertyBag::new();
        raw.insert("todo".to_string(), RawValue::Str("buy milk".to_string()));
        raw.insert("tags".to_string(), RawValue::Str("errands".to_string()));

        let (values, failures) = validate_bag(&raw, &ctx(ContentClass::Todo));
        assert!(failures.is_empty(), "{failures:?}");
        assert_eq!(
            values.get("tags"),
            Some(&Value::List(vec!["errands".to_string()]))
        );
    }

    #[test]
    fn not_applicable_property_is_an_error_when_supplied() {
        let mut raw = PropertyBag::new();
        raw.insert("todo".to_string(), RawValue::Str("buy milk".to_string()));
        raw.insert("start".to_string(), RawValue::Str("20250101".to_string()));

        let (_, failures) = validate_bag(&raw, &ctx(ContentClass::Todo));
        assert!(failures.iter().any(|err| matches!(
            err,
            ValidationError::NotApplicable { property: "start", .. }
        )));
    }

    #[test]
    fn failures_are_collected_across_properties() {
        let mut raw = PropertyBag::new();
        raw.insert("priority".to_string(), RawValue::Str("soon".to_string()));

        let (_, failures) = validate_bag(&raw, &ctx(ContentClass::Todo));
        let missing = failures.iter().any(|err| {
            matches!(err, ValidationError::RequiredMissing { property: "todo", .. })
        });
        let bad_type = failures.iter().any(|err| {
            matches!(err, ValidationError::Type { property: "priority", .. })
        });
        assert!(missing && bad_type, "{failures:?}");
    }
}
