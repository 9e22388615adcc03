//! Reconciliation orchestrator.
//!
//! # Responsibility
//! - Run the full pipeline once per invocation: scan, diff, purge,
//!   invalidate, then validate and republish every candidate entity.
//! - Aggregate entity-local failures into the error manifest.
//!
//! # Invariants
//! - Redundant rows are purged immediately and unconditionally.
//! - Candidate invalidation commits before any candidate is parsed; a crash
//!   mid-run leaves touched rows distrusted, never stale-but-trusted.
//! - Entity-local failures never abort the run; persistence failures always
//!   do.

use crate::config::Config;
use crate::identity::{IdentityError, IdentityGenerator};
use crate::manifest::{self, EntityFailure};
use crate::model::records::{EventRecord, NoteRecord, TodoRecord};
use crate::repo::index_repo::{IndexStore, RepoError, SqliteIndex};
use crate::scan;
use crate::schema::ContentClass;
use log::info;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod batch;
mod notes;

/// Per-invocation state threaded through every component.
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    /// Repository root; every scanned path is relative to it.
    pub root: PathBuf,
    /// User configuration supplying default values.
    pub config: Config,
}

impl ReconcileContext {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }
}

/// Result of one full reconciliation run. The per-class vectors carry only
/// successfully validated (published) entities; failures travel separately
/// and are mirrored into the manifest.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub failures: Vec<EntityFailure>,
    pub notes: Vec<NoteRecord>,
    pub todos: Vec<TodoRecord>,
    pub events: Vec<EventRecord>,
}

impl ReconcileOutcome {
    /// Whether the run left no manifest behind.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fatal reconciliation failure; the run aborts without a manifest rewrite.
#[derive(Debug)]
pub enum ReconcileError {
    /// The index cannot be read or written.
    Index(RepoError),
    /// The identity generator cannot advance its persisted state.
    Identity(IdentityError),
    /// The repository tree cannot be walked.
    Scan(std::io::Error),
    /// The manifest cannot be maintained; the fail-closed gate would lie.
    Manifest(std::io::Error),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(err) => write!(f, "index persistence failure: {err}"),
            Self::Identity(err) => write!(f, "identity generator failure: {err}"),
            Self::Scan(err) => write!(f, "repository scan failure: {err}"),
            Self::Manifest(err) => write!(f, "error manifest failure: {err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Index(err) => Some(err),
            Self::Identity(err) => Some(err),
            Self::Scan(err) | Self::Manifest(err) => Some(err),
        }
    }
}

impl From<RepoError> for ReconcileError {
    fn from(value: RepoError) -> Self {
        Self::Index(value)
    }
}

impl From<IdentityError> for ReconcileError {
    fn from(value: IdentityError) -> Self {
        Self::Identity(value)
    }
}

/// One content class's reconciliation sets for this run.
#[derive(Debug, Default)]
pub struct ClassDiff {
    pub disk: BTreeMap<PathBuf, f64>,
    pub new: BTreeSet<PathBuf>,
    pub modified: BTreeSet<PathBuf>,
    pub redundant: BTreeSet<PathBuf>,
}

impl ClassDiff {
    /// Computes new/modified/redundant sets from a disk scan and the
    /// persisted map. Modification is strict: equal timestamps are current.
    pub fn compute(disk: BTreeMap<PathBuf, f64>, persisted: &BTreeMap<PathBuf, f64>) -> Self {
        let mut new = BTreeSet::new();
        let mut modified = BTreeSet::new();

        for (path, disk_mtime) in &disk {
            match persisted.get(path) {
                None => {
                    new.insert(path.clone());
                }
                Some(persisted_mtime) if disk_mtime > persisted_mtime => {
                    modified.insert(path.clone());
                }
                Some(_) => {}
            }
        }

        let redundant = persisted
            .keys()
            .filter(|path| !disk.contains_key(*path))
            .cloned()
            .collect();

        Self {
            disk,
            new,
            modified,
            redundant,
        }
    }

    /// New and modified paths, in on-disk sort order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        self.new.union(&self.modified).cloned().collect()
    }
}

/// Runs the full reconciliation pipeline against an open index connection.
pub fn reconcile(
    conn: &Connection,
    ctx: &ReconcileContext,
    generator: &mut dyn IdentityGenerator,
) -> Result<ReconcileOutcome, ReconcileError> {
    let index = SqliteIndex::new(conn);
    reconcile_with_store(&index, ctx, generator)
}

/// Pipeline body, generic over the index store.
pub fn reconcile_with_store(
    store: &dyn IndexStore,
    ctx: &ReconcileContext,
    generator: &mut dyn IdentityGenerator,
) -> Result<ReconcileOutcome, ReconcileError> {
    manifest::remove_manifest(&ctx.root).map_err(ReconcileError::Manifest)?;

    // Scan, diff, and purge per class.
    let mut diffs: Vec<(ContentClass, ClassDiff)> = Vec::new();
    for class in ContentClass::ALL {
        let disk = scan::scan_disk(&ctx.root, class).map_err(ReconcileError::Scan)?;
        let persisted = store.tracked_paths(class)?;
        let diff = ClassDiff::compute(disk, &persisted);

        let redundant: Vec<PathBuf> = diff.redundant.iter().cloned().collect();
        store.purge_paths(class, &redundant)?;

        info!(
            "event=reconcile_diff module=reconcile status=ok class={} new={} modified={} redundant={}",
            class,
            diff.new.len(),
            diff.modified.len(),
            diff.redundant.len()
        );

        diffs.push((class, diff));
    }

    // Distrust every candidate row before any reparsing begins.
    for (class, diff) in &diffs {
        store.invalidate_paths(*class, &diff.candidates())?;
    }

    let mut outcome = ReconcileOutcome::default();
    for (class, diff) in &diffs {
        match class {
            ContentClass::Note => {
                outcome.notes =
                    notes::reconcile_notes(store, ctx, generator, diff, &mut outcome.failures)?;
            }
            ContentClass::Todo => {
                outcome.todos =
                    batch::reconcile_todos(store, ctx, generator, diff, &mut outcome.failures)?;
            }
            ContentClass::Event => {
                outcome.events =
                    batch::reconcile_events(store, ctx, generator, diff, &mut outcome.failures)?;
            }
        }
    }

    manifest::write_manifest(&ctx.root, &outcome.failures).map_err(ReconcileError::Manifest)?;

    info!(
        "event=reconcile module=reconcile status={} notes={} todos={} events={} failures={}",
        if outcome.is_clean() { "ok" } else { "gated" },
        outcome.notes.len(),
        outcome.todos.len(),
        outcome.events.len(),
        outcome.failures.len()
    );

    Ok(outcome)
}
