//! Index store contract and SQLite implementation.
//!
//! # Responsibility
//! - Read persisted `(path, mtime)` maps per content class.
//! - Purge redundant rows, invalidate candidates, and publish validated
//!   entities.
//!
//! # Invariants
//! - Batch publication is a whole-file replace: delete every row for the
//!   path, insert the de-duplicated winners.
//! - Published rows always carry `valid = 1`; invalidation always commits
//!   `valid = 0` before any reparse.

use crate::db::DbError;
use crate::model::records::{EventRecord, NoteRecord, TodoRecord};
use crate::schema::ContentClass;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type RepoResult<T> = Result<T, RepoError>;

/// Index persistence or data-shape failure.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted index data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// Identity-recovery seed read from an existing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSeed {
    pub id: String,
    pub creation: Option<String>,
}

/// Index access contract consumed by the reconciliation orchestrator.
pub trait IndexStore {
    /// Persisted `(path, mtime)` map for one content class.
    fn tracked_paths(&self, class: ContentClass) -> RepoResult<BTreeMap<PathBuf, f64>>;
    /// Deletes rows (and file-track rows, for batch classes) for paths no
    /// longer on disk.
    fn purge_paths(&self, class: ContentClass, paths: &[PathBuf]) -> RepoResult<()>;
    /// Marks every existing row under the candidate paths as distrusted.
    fn invalidate_paths(&self, class: ContentClass, paths: &[PathBuf]) -> RepoResult<()>;
    /// Identity seed for the note row holding `path`, if any.
    fn note_seed(&self, path: &Path) -> RepoResult<Option<RowSeed>>;
    /// Identity seeds for every batch row under `path`.
    fn batch_seeds(&self, class: ContentClass, path: &Path) -> RepoResult<Vec<RowSeed>>;
    /// Publishes one validated note with `valid = 1`.
    fn upsert_note(&self, record: &NoteRecord) -> RepoResult<()>;
    /// Whole-file replace of a todo batch file's rows.
    fn replace_todos(&self, path: &Path, records: &[TodoRecord]) -> RepoResult<()>;
    /// Whole-file replace of an event batch file's rows.
    fn replace_events(&self, path: &Path, records: &[EventRecord]) -> RepoResult<()>;
    /// Refreshes the tracked mtime for one batch file.
    fn refresh_file_mtime(&self, path: &Path, mtime: f64) -> RepoResult<()>;
}

/// SQLite-backed index store.
pub struct SqliteIndex<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIndex<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl IndexStore for SqliteIndex<'_> {
    fn tracked_paths(&self, class: ContentClass) -> RepoResult<BTreeMap<PathBuf, f64>> {
        let mut tracked = BTreeMap::new();

        if class.is_batch() {
            let mut stmt = self
                .conn
                .prepare("SELECT path, mtime FROM files WHERE path LIKE ?1")?;
            for suffix in class.suffixes() {
                let mut rows = stmt.query([format!("%{suffix}")])?;
                while let Some(row) = rows.next()? {
                    let path: String = row.get(0)?;
                    tracked.insert(PathBuf::from(path), row.get(1)?);
                }
            }
        } else {
            let mut stmt = self.conn.prepare("SELECT path, mtime FROM notes")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let path: String = row.get(0)?;
                tracked.insert(PathBuf::from(path), row.get(1)?);
            }
        }

        Ok(tracked)
    }

    fn purge_paths(&self, class: ContentClass, paths: &[PathBuf]) -> RepoResult<()> {
        let delete_row = format!("DELETE FROM {} WHERE path = ?1", class.table());
        for path in paths {
            let path = path_text(path);
            self.conn.execute(&delete_row, [path.as_str()])?;
            if class.is_batch() {
                self.conn
                    .execute("DELETE FROM files WHERE path = ?1", [path.as_str()])?;
            }
        }
        Ok(())
    }

    fn invalidate_paths(&self, class: ContentClass, paths: &[PathBuf]) -> RepoResult<()> {
        let update = format!("UPDATE {} SET valid = 0 WHERE path = ?1", class.table());
        for path in paths {
            self.conn.execute(&update, [path_text(path)])?;
        }
        Ok(())
    }

    fn note_seed(&self, path: &Path) -> RepoResult<Option<RowSeed>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, creation FROM notes WHERE path = ?1")?;
        let mut rows = stmt.query([path_text(path)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(RowSeed {
                id: row.get(0)?,
                creation: row.get(1)?,
            }));
        }
        Ok(None)
    }

    fn batch_seeds(&self, class: ContentClass, path: &Path) -> RepoResult<Vec<RowSeed>> {
        let query = format!("SELECT id, creation FROM {} WHERE path = ?1", class.table());
        let mut stmt = self.conn.prepare(&query)?;
        let mut rows = stmt.query([path_text(path)])?;
        let mut seeds = Vec::new();
        while let Some(row) = rows.next()? {
            seeds.push(RowSeed {
                id: row.get(0)?,
                creation: row.get(1)?,
            });
        }
        Ok(seeds)
    }

    fn upsert_note(&self, record: &NoteRecord) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO notes
                (id, path, title, tags, description, authour, creation, mtime, valid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
            params![
                record.id,
                path_text(&record.path),
                record.title,
                serde_json::to_string(&record.tags)?,
                record.description,
                record.authour,
                record.creation,
                record.mtime,
            ],
        )?;
        Ok(())
    }

    fn replace_todos(&self, path: &Path, records: &[TodoRecord]) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM todos WHERE path = ?1", [path_text(path)])?;
        for record in records {
            self.conn.execute(
                "INSERT OR REPLACE INTO todos
                    (id, todo, path, tags, authour, status, assignees, priority,
                     creation, deadline, valid)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)",
                params![
                    record.id,
                    record.todo,
                    path_text(&record.path),
                    serde_json::to_string(&record.tags)?,
                    record.authour,
                    record.status,
                    serde_json::to_string(&record.assignees)?,
                    record.priority,
                    record.creation,
                    record.deadline,
                ],
            )?;
        }
        Ok(())
    }

    fn replace_events(&self, path: &Path, records: &[EventRecord]) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM events WHERE path = ?1", [path_text(path)])?;
        for record in records {
            self.conn.execute(
                "INSERT OR REPLACE INTO events
                    (id, event, path, tags, authour, status, assignees, priority,
                     creation, start, \"end\", pattern, valid)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1)",
                params![
                    record.id,
                    record.event,
                    path_text(&record.path),
                    serde_json::to_string(&record.tags)?,
                    record.authour,
                    record.status,
                    serde_json::to_string(&record.assignees)?,
                    record.priority,
                    record.creation,
                    record.start,
                    record.end,
                    record.pattern,
                ],
            )?;
        }
        Ok(())
    }

    fn refresh_file_mtime(&self, path: &Path, mtime: f64) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO files (path, mtime) VALUES (?1, ?2)",
            params![path_text(path), mtime],
        )?;
        Ok(())
    }
}
