//! Core reconciliation engine for plainorg.
//!
//! Plain-text notes, todos, and events under a repository root are
//! continuously reconciled into an embedded relational index. This crate is
//! the single source of truth for the reconciliation invariants: idempotent
//! runs, one canonical representation per entity, safe partial failure, and
//! the shared cardinality/type/format validation pipeline.

pub mod config;
pub mod db;
pub mod extract;
pub mod identity;
pub mod logging;
pub mod manifest;
pub mod model;
pub mod reconcile;
pub mod repo;
pub mod scan;
pub mod schema;
pub mod validate;

pub use config::{Config, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DB_FILE};
pub use identity::{
    resolve_identity, ConfigIdentityGenerator, IdentityError, IdentityGenerator, Resolution,
};
pub use manifest::{manifest_exists, manifest_path, EntityFailure, MANIFEST_FILE};
pub use model::records::{EventRecord, NoteRecord, TodoRecord};
pub use reconcile::{reconcile, ReconcileContext, ReconcileError, ReconcileOutcome};
pub use schema::ContentClass;
pub use validate::ValidationError;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
