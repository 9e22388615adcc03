//! Error manifest: the fail-closed gate for the rest of the system.
//!
//! # Responsibility
//! - Collect every entity-local validation failure of a run.
//! - Maintain the single manifest file other commands consult before
//!   trusting the index.
//!
//! # Invariants
//! - Any previous manifest is removed at the start of a run.
//! - The manifest exists after a run exactly when at least one entity
//!   failed.

use crate::validate::ValidationError;
use log::warn;
use std::path::{Path, PathBuf};

/// Manifest file name, relative to the repository root.
pub const MANIFEST_FILE: &str = "plainorg_errors";

/// One failed entity: its file, the offending line for batch entities, and
/// every collected failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    pub path: PathBuf,
    /// The offending line for batch entities; `None` for whole-file
    /// entities.
    pub content: Option<String>,
    pub errors: Vec<ValidationError>,
}

impl EntityFailure {
    pub fn for_file(path: &Path, errors: Vec<ValidationError>) -> Self {
        Self {
            path: path.to_path_buf(),
            content: None,
            errors,
        }
    }

    pub fn for_line(path: &Path, line: &str, errors: Vec<ValidationError>) -> Self {
        Self {
            path: path.to_path_buf(),
            content: Some(line.trim().to_string()),
            errors,
        }
    }

    fn render(&self) -> String {
        let errors = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        match &self.content {
            Some(line) => format!("{} | \"{}\" >>> {}", self.path.display(), line, errors),
            None => format!("{}: {}", self.path.display(), errors),
        }
    }
}

/// Path of the manifest under `root`.
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

/// Whether a manifest from a previous (or the current) run exists. Commands
/// that consume the index must refuse to proceed while this is true.
pub fn manifest_exists(root: &Path) -> bool {
    manifest_path(root).is_file()
}

/// Removes any previous manifest; missing files are not an error.
pub fn remove_manifest(root: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(manifest_path(root)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Writes the manifest listing every failure; a run with no failures writes
/// nothing.
pub fn write_manifest(root: &Path, failures: &[EntityFailure]) -> std::io::Result<()> {
    if failures.is_empty() {
        return Ok(());
    }

    let lines = failures
        .iter()
        .map(EntityFailure::render)
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(manifest_path(root), format!("{lines}\n"))?;

    warn!(
        "event=manifest_write module=manifest status=gated failures={}",
        failures.len()
    );

    Ok(())
}
