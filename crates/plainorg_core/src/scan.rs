//! Disk-side repository scanner.
//!
//! # Responsibility
//! - Enumerate candidate files and modification times for one content class.
//!
//! # Invariants
//! - Pure read; never touches the index or the scanned files.
//! - Any path component starting with the reserved ignore prefix is
//!   invisible, at any depth.
//! - Returned paths are relative to the repository root.

use crate::schema::ContentClass;
use log::info;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Path components starting with this prefix are excluded from scans; logs,
/// archives, and other machinery live under such directories.
pub const IGNORE_PREFIX: &str = "_";

/// Modification time as fractional seconds since the epoch.
pub fn mtime_seconds(metadata: &std::fs::Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0.0, |duration| duration.as_secs_f64())
}

/// Walks the repository and collects `{relative_path: mtime}` for every file
/// matching one of the class's suffixes.
pub fn scan_disk(root: &Path, class: ContentClass) -> std::io::Result<BTreeMap<PathBuf, f64>> {
    let mut found = BTreeMap::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with(IGNORE_PREFIX)
    });

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !class.suffixes().iter().any(|suffix| name.ends_with(suffix)) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        found.insert(relative, mtime_seconds(&entry.metadata()?));
    }

    info!(
        "event=scan_disk module=scan status=ok class={} files={}",
        class,
        found.len()
    );

    Ok(found)
}
