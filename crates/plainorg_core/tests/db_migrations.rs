use plainorg_core::db::migrations::latest_version;
use plainorg_core::db::{open_db, open_db_in_memory};

#[test]
fn fresh_database_lands_on_the_latest_version() {
    let conn = open_db_in_memory().unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());
}

#[test]
fn all_index_tables_exist_after_bootstrap() {
    let conn = open_db_in_memory().unwrap();
    for table in ["notes", "todos", "events", "files"] {
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "missing table {table}");
    }
}

#[test]
fn reopening_an_existing_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".plainorg.db");

    let first = open_db(&path).unwrap();
    first
        .execute(
            "INSERT INTO files (path, mtime) VALUES ('a.td', 1.0)",
            [],
        )
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    let count: i64 = second
        .query_row("SELECT count(*) FROM files", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}
