//! Batch-file reconciliation pipeline for todos and events.
//!
//! Whole-file semantics: every timestamp advance re-derives all of a file's
//! entities. Lines are processed in on-disk order; duplicate content
//! collapses to the later line in an in-memory accumulator before any index
//! write, so the index only ever observes final winners.

use crate::extract::inline;
use crate::identity::{resolve_identity, IdentityGenerator};
use crate::manifest::EntityFailure;
use crate::model::records::{EventRecord, TodoRecord};
use crate::model::value::{Value, ValueMap};
use crate::reconcile::{ClassDiff, ReconcileContext, ReconcileError};
use crate::repo::index_repo::IndexStore;
use crate::scan::mtime_seconds;
use crate::schema::ContentClass;
use crate::validate::{validate_bag, ValidationContext, ValidationError};
use log::debug;
use std::collections::BTreeMap;
use std::path::Path;

/// One validated line that survived intra-file de-duplication.
struct BatchEntity {
    content: String,
    id: String,
    values: ValueMap,
}

struct FileOutcome {
    winners: Vec<BatchEntity>,
    /// Whether every line of the file validated; only then is the tracked
    /// mtime refreshed, so a file carrying failures stays a candidate.
    clean: bool,
    mtime: f64,
}

pub(crate) fn reconcile_todos(
    store: &dyn IndexStore,
    ctx: &ReconcileContext,
    generator: &mut dyn IdentityGenerator,
    diff: &ClassDiff,
    failures: &mut Vec<EntityFailure>,
) -> Result<Vec<TodoRecord>, ReconcileError> {
    let mut records = Vec::new();

    for path in diff.candidates() {
        let Some(outcome) =
            process_file(store, ctx, generator, ContentClass::Todo, &path, failures)?
        else {
            continue;
        };

        let rows: Vec<TodoRecord> = outcome
            .winners
            .iter()
            .map(|winner| TodoRecord::from_values(&path, &winner.id, &winner.values))
            .collect();
        store.replace_todos(&path, &rows)?;
        if outcome.clean {
            store.refresh_file_mtime(&path, outcome.mtime)?;
        }
        records.extend(rows);
    }

    Ok(records)
}

pub(crate) fn reconcile_events(
    store: &dyn IndexStore,
    ctx: &ReconcileContext,
    generator: &mut dyn IdentityGenerator,
    diff: &ClassDiff,
    failures: &mut Vec<EntityFailure>,
) -> Result<Vec<EventRecord>, ReconcileError> {
    let mut records = Vec::new();

    for path in diff.candidates() {
        let Some(outcome) =
            process_file(store, ctx, generator, ContentClass::Event, &path, failures)?
        else {
            continue;
        };

        let rows: Vec<EventRecord> = outcome
            .winners
            .iter()
            .map(|winner| EventRecord::from_values(&path, &winner.id, &winner.values))
            .collect();
        store.replace_events(&path, &rows)?;
        if outcome.clean {
            store.refresh_file_mtime(&path, outcome.mtime)?;
        }
        records.extend(rows);
    }

    Ok(records)
}

/// Parses, validates, de-duplicates, and rewrites one batch file.
///
/// Returns `None` when the file could not be read or written back; the
/// failure is recorded and the file's rows are left as invalidated.
fn process_file(
    store: &dyn IndexStore,
    ctx: &ReconcileContext,
    generator: &mut dyn IdentityGenerator,
    class: ContentClass,
    path: &Path,
    failures: &mut Vec<EntityFailure>,
) -> Result<Option<FileOutcome>, ReconcileError> {
    let full = ctx.root.join(path);
    debug!(
        "event=batch_check module=reconcile class={} path={}",
        class,
        path.display()
    );

    let text = match std::fs::read_to_string(&full) {
        Ok(text) => text,
        Err(err) => {
            failures.push(EntityFailure::for_file(
                path,
                vec![ValidationError::Parse {
                    reason: format!("cannot read file: {err}"),
                }],
            ));
            return Ok(None);
        }
    };

    let user = ctx.config.user_handle();
    let seeds = store.batch_seeds(class, path)?;
    let original_lines: Vec<&str> = text.lines().collect();

    let mut rebuilt: Vec<String> = Vec::new();
    // Content -> index into `rebuilt`, for last-occurrence-wins collapsing.
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut winners: Vec<BatchEntity> = Vec::new();
    let mut clean = true;

    for line in &original_lines {
        if !inline::is_entity_line(line) {
            rebuilt.push((*line).to_string());
            continue;
        }

        let entity = inline::parse_line(line, class);
        let seed = entity
            .embedded_id
            .as_deref()
            .and_then(|embedded| seeds.iter().find(|seed| seed.id == embedded));

        let resolution = resolve_identity(
            seed.map(|seed| seed.id.as_str()),
            entity.embedded_id.as_deref(),
            generator,
        )?;

        let (values, errors) = validate_bag(
            &entity.bag,
            &ValidationContext {
                class,
                user: &user,
                persisted_creation: seed.and_then(|seed| seed.creation.as_deref()),
            },
        );
        if !errors.is_empty() {
            failures.push(EntityFailure::for_line(path, line, errors));
            rebuilt.push((*line).to_string());
            clean = false;
            continue;
        }

        let canonical = inline::render_line(line, class, &values, resolution.id());
        let new_line = if canonical.trim() == line.trim() {
            (*line).to_string()
        } else {
            canonical
        };

        let content = values
            .get(class.content_property())
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // Duplicate content: drop the earlier line and its entity; the
        // later occurrence wins.
        if let Some(old_index) = seen.remove(&content) {
            rebuilt.remove(old_index);
            for index in seen.values_mut() {
                if *index > old_index {
                    *index -= 1;
                }
            }
            winners.retain(|winner| winner.content != content);
        }

        rebuilt.push(new_line);
        seen.insert(content.clone(), rebuilt.len() - 1);
        winners.push(BatchEntity {
            content,
            id: resolution.into_id(),
            values,
        });
    }

    let changed = rebuilt.len() != original_lines.len()
        || rebuilt.iter().zip(&original_lines).any(|(new, old)| new != old);
    if changed {
        let rewritten = format!("{}\n", rebuilt.join("\n"));
        if let Err(err) = std::fs::write(&full, rewritten) {
            failures.push(EntityFailure::for_file(
                path,
                vec![ValidationError::Parse {
                    reason: format!("cannot rewrite file: {err}"),
                }],
            ));
            return Ok(None);
        }
    }

    let mtime = match std::fs::metadata(&full) {
        Ok(metadata) => mtime_seconds(&metadata),
        Err(err) => {
            failures.push(EntityFailure::for_file(
                path,
                vec![ValidationError::Parse {
                    reason: format!("cannot stat file: {err}"),
                }],
            ));
            return Ok(None);
        }
    };

    Ok(Some(FileOutcome {
        winners,
        clean,
        mtime,
    }))
}
