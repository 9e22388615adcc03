use plainorg_core::identity::{IdentityGenerator, IdentityResult};
use plainorg_core::{manifest_exists, open_db_in_memory, reconcile, Config, ReconcileContext};
use rusqlite::Connection;

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

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn bare_todo_line_gains_defaults_tokens_and_a_row() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("chores.td");

    std::fs::write(&path, "* t: walk dog\n").unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert!(outcome.is_clean());
    assert_eq!(outcome.todos.len(), 1);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("* t: walk dog // "));
    assert!(text.contains("$ada.lovelace"));
    assert!(text.contains("=todo"));
    assert!(text.contains("!3"));
    assert!(text.contains("#general"));
    assert!(text.contains("@ada.lovelace"));
    assert!(text.contains("id/id0001"));

    let (todo, status, priority, valid): (String, String, i64, i64) = conn
        .query_row(
            "SELECT todo, status, priority, valid FROM todos",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!(todo, "walk dog");
    assert_eq!(status, "todo");
    assert_eq!(priority, 3);
    assert_eq!(valid, 1);

    // The batch file itself is tracked with its post-write timestamp.
    assert_eq!(count(&conn, "files"), 1);
}

#[test]
fn duplicate_content_collapses_to_the_later_line() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("list.td");

    std::fs::write(
        &path,
        "* t: buy milk // #dairy\n* t: buy milk // #groceries\n",
    )
    .unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert!(outcome.is_clean());
    assert_eq!(outcome.todos.len(), 1);
    assert_eq!(count(&conn, "todos"), 1);

    let tags: String = conn
        .query_row("SELECT tags FROM todos", [], |row| row.get(0))
        .unwrap();
    assert_eq!(tags, "[\"groceries\"]");

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.matches("buy milk").count(), 1);
    assert!(text.contains("#groceries"));
    assert!(!text.contains("#dairy"));
}

#[test]
fn event_with_unknown_status_is_gated_and_left_unmodified() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("cal.ev");

    let original = "* e: sprint review // >20260110T1500 =wip\n";
    std::fs::write(&path, original).unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.events.is_empty());
    assert!(manifest_exists(dir.path()));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    assert_eq!(count(&conn, "events"), 0);

    let manifest = std::fs::read_to_string(dir.path().join("plainorg_errors")).unwrap();
    assert!(manifest.contains("cal.ev"));
    assert!(manifest.contains("wip"));
    assert!(manifest.contains("inprogress"));
}

#[test]
fn deleting_a_batch_file_purges_rows_and_file_tracking() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("tasks.td");

    std::fs::write(&path, "* t: transient\n").unwrap();
    reconcile(&conn, &ctx, &mut generator).unwrap();
    assert_eq!(count(&conn, "todos"), 1);
    assert_eq!(count(&conn, "files"), 1);

    std::fs::remove_file(&path).unwrap();
    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();

    assert!(outcome.is_clean());
    assert_eq!(count(&conn, "todos"), 0);
    assert_eq!(count(&conn, "files"), 0);
    assert!(!manifest_exists(dir.path()));
}

#[test]
fn second_run_with_no_changes_leaves_batch_files_alone() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("stable.td");

    std::fs::write(&path, "* t: water plants // #garden\n").unwrap();
    reconcile(&conn, &ctx, &mut generator).unwrap();

    let bytes_after_first = std::fs::read(&path).unwrap();
    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();

    assert!(outcome.is_clean());
    assert!(outcome.todos.is_empty());
    assert_eq!(std::fs::read(&path).unwrap(), bytes_after_first);
    assert_eq!(count(&conn, "todos"), 1);
    assert_eq!(generator.minted, 1);
}

#[test]
fn modified_batch_file_rederives_every_entity() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("work.td");

    std::fs::write(&path, "* t: draft report\n* t: send invoice\n").unwrap();
    reconcile(&conn, &ctx, &mut generator).unwrap();
    assert_eq!(count(&conn, "todos"), 2);

    // Drop one line and force the file back into the candidate set.
    let text = std::fs::read_to_string(&path).unwrap();
    let kept: Vec<&str> = text.lines().filter(|l| l.contains("draft report")).collect();
    std::fs::write(&path, format!("{}\n", kept.join("\n"))).unwrap();
    conn.execute("UPDATE files SET mtime = 0", []).unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert!(outcome.is_clean());
    assert_eq!(count(&conn, "todos"), 1);

    // The surviving line keeps its identity through the embedded token.
    let id: String = conn
        .query_row("SELECT id FROM todos", [], |row| row.get(0))
        .unwrap();
    assert_eq!(id, "id0001");
    assert_eq!(generator.minted, 2);
}

#[test]
fn a_file_with_failures_stays_a_candidate_until_fixed() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();
    let path = dir.path().join("mixed.td");

    std::fs::write(&path, "* t: good one\n* t: broken // !high\n").unwrap();

    let first = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert_eq!(first.failures.len(), 1);
    assert_eq!(count(&conn, "todos"), 1);
    assert!(manifest_exists(dir.path()));

    // No filesystem change: the failure re-surfaces because the file's
    // tracked mtime was never refreshed.
    let second = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert_eq!(second.failures.len(), 1);
    assert!(manifest_exists(dir.path()));

    // Fixing the line clears the gate.
    let text = std::fs::read_to_string(&path).unwrap();
    let repaired = text.replace("!high", "!4");
    std::fs::write(&path, repaired).unwrap();

    let third = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert!(third.is_clean());
    assert!(!manifest_exists(dir.path()));
    assert_eq!(count(&conn, "todos"), 2);
}

#[test]
fn todo_and_event_files_reconcile_independently() {
    let (dir, conn, ctx) = setup();
    let mut generator = SeqGenerator::new();

    std::fs::write(dir.path().join("a.td"), "* t: pay rent // %20260201\n").unwrap();
    std::fs::write(
        dir.path().join("b.ev"),
        "* e: standup // >20260106T0915 ^1d\n",
    )
    .unwrap();

    let outcome = reconcile(&conn, &ctx, &mut generator).unwrap();
    assert!(outcome.is_clean());
    assert_eq!(outcome.todos.len(), 1);
    assert_eq!(outcome.events.len(), 1);

    let deadline: Option<String> = conn
        .query_row("SELECT deadline FROM todos", [], |row| row.get(0))
        .unwrap();
    assert_eq!(deadline.as_deref(), Some("20260201"));

    let (start, pattern): (String, Option<String>) = conn
        .query_row("SELECT start, pattern FROM events", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(start, "20260106T0915");
    assert_eq!(pattern.as_deref(), Some("1d"));
    assert_eq!(count(&conn, "files"), 2);
}
