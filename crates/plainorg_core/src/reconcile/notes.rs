//! Note reconciliation pipeline.
//!
//! One entity per file: extract front matter, recover identity, validate,
//! rewrite to canonical form when it differs, publish with `valid = 1`.
//! Failed notes are collected and left untouched on disk and in the index.

use crate::extract::front_matter;
use crate::identity::{resolve_identity, IdentityGenerator};
use crate::manifest::EntityFailure;
use crate::model::records::NoteRecord;
use crate::model::value::RawValue;
use crate::reconcile::{ClassDiff, ReconcileContext, ReconcileError};
use crate::repo::index_repo::IndexStore;
use crate::scan::mtime_seconds;
use crate::schema::ContentClass;
use crate::validate::{validate_bag, ValidationContext, ValidationError};
use log::debug;

pub(crate) fn reconcile_notes(
    store: &dyn IndexStore,
    ctx: &ReconcileContext,
    generator: &mut dyn IdentityGenerator,
    diff: &ClassDiff,
    failures: &mut Vec<EntityFailure>,
) -> Result<Vec<NoteRecord>, ReconcileError> {
    let user = ctx.config.user_handle();
    let mut records = Vec::new();

    for path in diff.candidates() {
        let full = ctx.root.join(&path);
        debug!("event=note_check module=reconcile path={}", path.display());

        let text = match std::fs::read_to_string(&full) {
            Ok(text) => text,
            Err(err) => {
                failures.push(EntityFailure::for_file(
                    &path,
                    vec![ValidationError::Parse {
                        reason: format!("cannot read file: {err}"),
                    }],
                ));
                continue;
            }
        };

        let document = match front_matter::split_document(&text) {
            Ok(document) => document,
            Err(err) => {
                failures.push(EntityFailure::for_file(&path, vec![err]));
                continue;
            }
        };

        let raw = document
            .front
            .map(|block| front_matter::parse_front(block, ContentClass::Note))
            .unwrap_or_default();

        let seed = store.note_seed(&path)?;
        let embedded = raw.get("id").and_then(RawValue::as_str);
        let resolution = resolve_identity(
            seed.as_ref().map(|seed| seed.id.as_str()),
            embedded,
            generator,
        )?;

        let (values, errors) = validate_bag(
            &raw,
            &ValidationContext {
                class: ContentClass::Note,
                user: &user,
                persisted_creation: seed.as_ref().and_then(|seed| seed.creation.as_deref()),
            },
        );
        if !errors.is_empty() {
            failures.push(EntityFailure::for_file(&path, errors));
            continue;
        }

        let canonical = front_matter::render(&values, resolution.id(), document.body);
        if canonical != text {
            if let Err(err) = std::fs::write(&full, &canonical) {
                failures.push(EntityFailure::for_file(
                    &path,
                    vec![ValidationError::Parse {
                        reason: format!("cannot rewrite file: {err}"),
                    }],
                ));
                continue;
            }
        }

        let mtime = match std::fs::metadata(&full) {
            Ok(metadata) => mtime_seconds(&metadata),
            Err(err) => {
                failures.push(EntityFailure::for_file(
                    &path,
                    vec![ValidationError::Parse {
                        reason: format!("cannot stat file: {err}"),
                    }],
                ));
                continue;
            }
        };

        let record = NoteRecord::from_values(&path, resolution.id(), mtime, &values);
        store.upsert_note(&record)?;
        records.push(record);
    }

    Ok(records)
}
