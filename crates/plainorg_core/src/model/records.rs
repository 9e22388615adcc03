//! Per-class read models mirrored into the index tables.
//!
//! Field sets match the `notes` / `todos` / `events` table columns. The
//! `from_values` constructors assume a validated map, where every required
//! and defaultable property is present; missing optionals stay `None`.

use crate::model::value::{Value, ValueMap};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn str_value(values: &ValueMap, key: &str) -> String {
    values
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn opt_str_value(values: &ValueMap, key: &str) -> Option<String> {
    values
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn list_value(values: &ValueMap, key: &str) -> Vec<String> {
    values
        .get(key)
        .and_then(Value::as_list)
        .map(<[String]>::to_vec)
        .unwrap_or_default()
}

fn int_value(values: &ValueMap, key: &str) -> i64 {
    values.get(key).and_then(Value::as_int).unwrap_or_default()
}

/// One reconciled note, as persisted in the `notes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: String,
    pub path: PathBuf,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub authour: String,
    pub creation: String,
    /// Post-write file timestamp, seconds since the epoch.
    pub mtime: f64,
}

impl NoteRecord {
    pub fn from_values(path: &Path, id: &str, mtime: f64, values: &ValueMap) -> Self {
        Self {
            id: id.to_string(),
            path: path.to_path_buf(),
            title: str_value(values, "title"),
            description: opt_str_value(values, "description"),
            tags: list_value(values, "tags"),
            authour: str_value(values, "authour"),
            creation: str_value(values, "creation"),
            mtime,
        }
    }
}

/// One reconciled todo, as persisted in the `todos` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoRecord {
    pub id: String,
    pub todo: String,
    pub path: PathBuf,
    pub tags: Vec<String>,
    pub authour: String,
    pub status: String,
    pub assignees: Vec<String>,
    pub priority: i64,
    pub creation: String,
    pub deadline: Option<String>,
}

impl TodoRecord {
    pub fn from_values(path: &Path, id: &str, values: &ValueMap) -> Self {
        Self {
            id: id.to_string(),
            todo: str_value(values, "todo"),
            path: path.to_path_buf(),
            tags: list_value(values, "tags"),
            authour: str_value(values, "authour"),
            status: str_value(values, "status"),
            assignees: list_value(values, "assignees"),
            priority: int_value(values, "priority"),
            creation: str_value(values, "creation"),
            deadline: opt_str_value(values, "deadline"),
        }
    }
}

/// One reconciled event, as persisted in the `events` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub event: String,
    pub path: PathBuf,
    pub tags: Vec<String>,
    pub authour: String,
    pub status: String,
    pub assignees: Vec<String>,
    pub priority: i64,
    pub creation: String,
    pub start: String,
    pub end: Option<String>,
    pub pattern: Option<String>,
}

impl EventRecord {
    pub fn from_values(path: &Path, id: &str, values: &ValueMap) -> Self {
        Self {
            id: id.to_string(),
            event: str_value(values, "event"),
            path: path.to_path_buf(),
            tags: list_value(values, "tags"),
            authour: str_value(values, "authour"),
            status: str_value(values, "status"),
            assignees: list_value(values, "assignees"),
            priority: int_value(values, "priority"),
            creation: str_value(values, "creation"),
            start: str_value(values, "start"),
            end: opt_str_value(values, "end"),
            pattern: opt_str_value(values, "pattern"),
        }
    }
}
