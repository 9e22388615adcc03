//! Connection bootstrap for the index database.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Apply pending migrations before handing out a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and migrations applied.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Opens the index database file and applies all pending migrations.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    info!("event=db_open module=db status=start mode=file");
    let mut conn = Connection::open(path)?;
    bootstrap(&mut conn).inspect_err(|err| {
        error!("event=db_open module=db status=error mode=file error={err}");
    })?;
    info!("event=db_open module=db status=ok mode=file");
    Ok(conn)
}

/// Opens an in-memory index and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let mut conn = Connection::open_in_memory()?;
    bootstrap(&mut conn)?;
    info!("event=db_open module=db status=ok mode=memory");
    Ok(conn)
}

fn bootstrap(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(conn)?;
    Ok(())
}
