use plainorg_core::identity::{IdentityGenerator, IdentityResult};
use plainorg_core::{manifest_exists, open_db_in_memory, reconcile, Config, ReconcileContext};
use rusqlite::Connection;
use std::path::Path;

struct SeqGenerator {
    minted: u32,
}

impl SeqGenerator {
    fn new() -> Self {
        Self { minted: 0 }
    }
}

impl IdentityGenerator for SeqGenerator {
    fn mint(&mut self) -> IdentityResult<String> {
        self.minted += 1;
        Ok(format!("id{:04}", self.minted))
    }
}

fn test_config() -> Config {
    Config {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        dob: "18151210".to_string(),
        user_id: None,
        counter: 0,
    }
}

fn setup() -> (tempfile::TempDir, Connection, ReconcileContext) {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db_in_memory().unwrap();
    let ctx = ReconcileContext::new(dir.path(), test_config());
    (dir, conn, ctx)
}

fn note_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT count(*) FROM notes", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn bare_note_gains_front_matter_defaults_and_a_valid_row() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();

    std::fs::write(dir.path().join("first.txt"), "remember the milk\n").unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert!(outcome.is_clean());
    assert_eq!(outcome.notes.len(), 1);

    let text = std::fs::read_to_string(dir.path().join("first.txt")).unwrap();
    assert!(text.starts_with("---\ntitle: "));
    assert!(text.contains("tags: [general]"));
    assert!(text.contains("authour: ada.lovelace"));
    assert!(text.contains("id: id0001"));
    assert!(text.ends_with("---\n\nremember the milk\n"));

    let (tags, valid): (String, i64) = conn
        .query_row(
            "SELECT tags, valid FROM notes WHERE path = 'first.txt'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(tags, "[\"general\"]");
    assert_eq!(valid, 1);
}

#[test]
fn second_run_with_no_changes_is_a_noop() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("note.txt");

    std::fs::write(&path, "stable body\n").unwrap();
    reconcile(&conn, &ctx, &mut generator).unwrap();

    let bytes_after_first = std::fs::read(&path).unwrap();
    let mtime_after_first: f64 = conn
        .query_row("SELECT mtime FROM notes WHERE path = 'note.txt'", [], |row| {
            row.get(0)
        })
        .unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert!(outcome.is_clean());
    assert!(outcome.notes.is_empty());

    assert_eq!(std::fs::read(&path).unwrap(), bytes_after_first);
    let mtime_after_second: f64 = conn
        .query_row("SELECT mtime FROM notes WHERE path = 'note.txt'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(mtime_after_first, mtime_after_second);
    assert_eq!(note_count(&conn), 1);
    assert_eq!(generator.minted, 1);
}

#[test]
fn deleted_note_is_purged_without_errors() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("gone.txt");

    std::fs::write(&path, "short lived\n").unwrap();
    reconcile(&conn, &ctx, &mut generator).unwrap();
    assert_eq!(note_count(&conn), 1);

    std::fs::remove_file(&path).unwrap();
    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();

    assert!(outcome.is_clean());
    assert_eq!(note_count(&conn), 0);
    assert!(!manifest_exists(dir.path()));
}

#[test]
fn invalid_note_is_reported_and_left_untouched() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("broken.txt");

    let original = "---\ntags: [has space]\n---\n\nbody\n";
    std::fs::write(&path, original).unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert_eq!(outcome.failures.len(), 1);
    assert!(manifest_exists(dir.path()));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    assert_eq!(note_count(&conn), 0);

    let manifest = std::fs::read_to_string(dir.path().join("plainorg_errors")).unwrap();
    assert!(manifest.contains("broken.txt"));
    assert!(manifest.contains("has space"));
}

#[test]
fn unterminated_front_matter_is_a_parse_failure() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();

    std::fs::write(dir.path().join("dangling.txt"), "---\ntitle: x\nno close").unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert_eq!(outcome.failures.len(), 1);
    assert!(manifest_exists(dir.path()));
    assert_eq!(note_count(&conn), 0);
}

#[test]
fn renamed_note_keeps_its_identity_through_the_embedded_token() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();

    std::fs::write(dir.path().join("old.txt"), "movable body\n").unwrap();
    reconcile(&conn, &ctx, &mut generator).unwrap();

    std::fs::rename(dir.path().join("old.txt"), dir.path().join("new.txt")).unwrap();
    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert!(outcome.is_clean());

    assert_eq!(note_count(&conn), 1);
    let (path, id): (String, String) = conn
        .query_row("SELECT path, id FROM notes", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(path, "new.txt");
    assert_eq!(id, "id0001");
    assert_eq!(generator.minted, 1);
}

#[test]
fn modified_note_reuses_its_persisted_creation() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("log.txt");

    std::fs::write(&path, "day one\n").unwrap();
    reconcile(&conn, &ctx, &mut generator).unwrap();

    let creation_first: String = conn
        .query_row("SELECT creation FROM notes WHERE path = 'log.txt'", [], |row| {
            row.get(0)
        })
        .unwrap();

    // Append to the body and force the file back into the candidate set.
    let mut text = std::fs::read_to_string(&path).unwrap();
    text.push_str("day two\n");
    std::fs::write(&path, text).unwrap();
    conn.execute("UPDATE notes SET mtime = 0 WHERE path = 'log.txt'", [])
        .unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert!(outcome.is_clean());
    assert_eq!(outcome.notes.len(), 1);

    let creation_second: String = conn
        .query_row("SELECT creation FROM notes WHERE path = 'log.txt'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(creation_first, creation_second);
    assert_eq!(generator.minted, 1);
}

#[test]
fn stale_manifest_is_cleared_by_a_clean_run() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();

    std::fs::write(dir.path().join("plainorg_errors"), "stale failure\n").unwrap();
    std::fs::write(dir.path().join("fine.txt"), "all good\n").unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert!(outcome.is_clean());
    assert!(!manifest_exists(dir.path()));
}

#[test]
fn ignored_directories_are_not_reconciled() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();

    std::fs::create_dir(dir.path().join("_archive")).unwrap();
    std::fs::write(dir.path().join("_archive").join("old.txt"), "ignored\n").unwrap();
    std::fs::write(dir.path().join("seen.txt"), "indexed\n").unwrap();

    reconcile(&conn, &ctx, &mut generator).unwrap();
    assert_eq!(note_count(&conn), 1);
    let path: String = conn
        .query_row("SELECT path FROM notes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(path, Path::new("seen.txt").display().to_string());
}
