#![allow(clippy::unwrap_used, clippy::expect_used)]

use farmops_lib::migrate::{self, MigrationStatus};
use farmops_lib::{DatabaseErrorKind, MigrationError};
use tempfile::tempdir;

mod util;

use util::{ledger_names, table_exists, temp_pool, write_migrations, SpyTarget};

const GARDENS: &str = "\
-- gardens
CREATE TABLE gardens (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
CREATE INDEX gardens_name_idx ON gardens(name);
";

#[tokio::test]
async fn second_run_applies_nothing() {
    let dir = tempdir().unwrap();
    write_migrations(
        dir.path(),
        &[
            ("001_gardens.sql", GARDENS),
            ("002_harvests.sql", "CREATE TABLE harvests (garden_id INTEGER, kg REAL)"),
        ],
    );
    let mut pool = temp_pool().await;

    let first = migrate::run_migrations(&mut pool, Some(dir.path())).await.unwrap();
    assert_eq!(first.applied, vec!["001_gardens", "002_harvests"]);
    assert!(first.skipped.is_empty());

    let second = migrate::run_migrations(&mut pool, Some(dir.path())).await.unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.skipped, vec!["001_gardens", "002_harvests"]);
    assert_eq!(second.tolerated, 0);

    assert_eq!(ledger_names(&pool).await, vec!["001_gardens", "002_harvests"]);
}

#[tokio::test]
async fn applies_in_filename_order() {
    let dir = tempdir().unwrap();
    // Written out of order on purpose; each file depends on the one before.
    write_migrations(
        dir.path(),
        &[
            ("010_c.sql", "INSERT INTO steps (label) VALUES ('c');"),
            ("001_a.sql", "CREATE TABLE steps (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT);"),
            ("002_b.sql", "INSERT INTO steps (label) VALUES ('b');"),
        ],
    );
    let mut pool = temp_pool().await;

    let report = migrate::run_migrations(&mut pool, Some(dir.path())).await.unwrap();
    assert_eq!(report.applied, vec!["001_a", "002_b", "010_c"]);
    assert_eq!(ledger_names(&pool).await, vec!["001_a", "002_b", "010_c"]);

    let labels: Vec<String> = sqlx::query_scalar("SELECT label FROM steps ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(labels, vec!["b", "c"]);
}

#[tokio::test]
async fn recorded_migration_is_never_resubmitted() {
    let dir = tempdir().unwrap();
    write_migrations(
        dir.path(),
        &[
            ("001_a.sql", "CREATE TABLE crops (name TEXT);"),
            ("002_b.sql", "CREATE TABLE beds (name TEXT);"),
        ],
    );
    let pool = temp_pool().await;
    migrate::ensure_ledger(&mut pool.clone()).await.unwrap();
    sqlx::query("INSERT INTO schema_migrations (name) VALUES ('001_a')")
        .execute(&pool)
        .await
        .unwrap();

    let mut spy = SpyTarget::new(pool.clone());
    let report = migrate::run_migrations(&mut spy, Some(dir.path())).await.unwrap();

    assert_eq!(report.skipped, vec!["001_a"]);
    assert_eq!(report.applied, vec!["002_b"]);
    assert!(!spy.saw("CREATE TABLE crops"));
    assert!(spy.saw("CREATE TABLE beds"));
    assert!(!table_exists(&pool, "crops").await);
}

#[tokio::test]
async fn already_exists_is_tolerated() {
    let dir = tempdir().unwrap();
    write_migrations(
        dir.path(),
        &[(
            "001_inspections.sql",
            "CREATE TABLE inspections (id INTEGER);\nCREATE TABLE inspection_notes (id INTEGER);",
        )],
    );
    let mut pool = temp_pool().await;
    // Left behind by an interrupted earlier run.
    sqlx::query("CREATE TABLE inspections (id INTEGER)")
        .execute(&pool)
        .await
        .unwrap();

    let report = migrate::run_migrations(&mut pool, Some(dir.path())).await.unwrap();
    assert_eq!(report.tolerated, 1);
    assert_eq!(report.applied, vec!["001_inspections"]);
    assert!(table_exists(&pool, "inspection_notes").await);
    assert_eq!(ledger_names(&pool).await, vec!["001_inspections"]);
}

#[tokio::test]
async fn fatal_statement_halts_the_run() {
    let dir = tempdir().unwrap();
    write_migrations(
        dir.path(),
        &[
            ("001_a.sql", "CREATE TABLE a (id INTEGER);"),
            (
                "002_b.sql",
                "CREATE TABLE x (id INTEGER);\nSELEC nonsense FROM nowhere;\nCREATE TABLE y (id INTEGER);",
            ),
            ("003_c.sql", "CREATE TABLE c (id INTEGER);"),
        ],
    );
    let mut pool = temp_pool().await;

    let err = migrate::run_migrations(&mut pool, Some(dir.path()))
        .await
        .unwrap_err();
    match &err {
        MigrationError::Statement {
            migration,
            index,
            preview,
            ..
        } => {
            assert_eq!(migration, "002_b");
            assert_eq!(*index, 2);
            assert_eq!(preview, "SELEC nonsense FROM nowhere");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.database_kind(), Some(DatabaseErrorKind::Other));

    assert_eq!(ledger_names(&pool).await, vec!["001_a"]);
    assert!(table_exists(&pool, "x").await);
    assert!(!table_exists(&pool, "y").await);
    assert!(!table_exists(&pool, "c").await);
}

#[tokio::test]
async fn retry_after_fix_resumes_from_failed_file() {
    let dir = tempdir().unwrap();
    write_migrations(
        dir.path(),
        &[
            ("001_a.sql", "CREATE TABLE a (id INTEGER);"),
            ("002_b.sql", "CREATE TABLE b (id INTEGER);\nSELEC 1;"),
        ],
    );
    let mut pool = temp_pool().await;
    migrate::run_migrations(&mut pool, Some(dir.path()))
        .await
        .unwrap_err();

    write_migrations(
        dir.path(),
        &[("002_b.sql", "CREATE TABLE b (id INTEGER);\nCREATE TABLE b2 (id INTEGER);")],
    );
    let report = migrate::run_migrations(&mut pool, Some(dir.path())).await.unwrap();
    assert_eq!(report.skipped, vec!["001_a"]);
    assert_eq!(report.applied, vec!["002_b"]);
    assert_eq!(report.tolerated, 1);
}

#[tokio::test]
async fn missing_directory_is_zero_migrations() {
    let dir = tempdir().unwrap();
    let mut pool = temp_pool().await;

    let report = migrate::run_migrations(&mut pool, Some(dir.path().join("absent").as_path()))
        .await
        .unwrap();
    assert_eq!(report, migrate::MigrationReport::default());

    let report = migrate::run_migrations(&mut pool, None).await.unwrap();
    assert!(report.applied.is_empty());

    // The ledger is still created.
    assert!(table_exists(&pool, "schema_migrations").await);
}

#[tokio::test]
async fn failed_ledger_write_is_reported_not_raised() {
    let dir = tempdir().unwrap();
    write_migrations(dir.path(), &[("001_a.sql", "CREATE TABLE a (id INTEGER);")]);
    let pool = temp_pool().await;

    let mut spy = SpyTarget::new(pool.clone());
    spy.fail_ledger_insert = true;
    let report = migrate::run_migrations(&mut spy, Some(dir.path())).await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.unrecorded, vec!["001_a"]);
    assert!(table_exists(&pool, "a").await);
    assert!(ledger_names(&pool).await.is_empty());

    // Next run re-applies it; the existing table is tolerated.
    let mut spy = SpyTarget::new(pool.clone());
    let report = migrate::run_migrations(&mut spy, Some(dir.path())).await.unwrap();
    assert_eq!(report.applied, vec!["001_a"]);
    assert_eq!(report.tolerated, 1);
    assert!(spy.saw("CREATE TABLE a"));
}

#[tokio::test]
async fn plan_lists_applied_and_pending() {
    let dir = tempdir().unwrap();
    write_migrations(dir.path(), &[("001_a.sql", "CREATE TABLE a (id INTEGER);")]);
    let mut pool = temp_pool().await;
    migrate::run_migrations(&mut pool, Some(dir.path())).await.unwrap();
    write_migrations(dir.path(), &[("002_b.sql", "CREATE TABLE b (id INTEGER);")]);

    let plan = migrate::plan_migrations(&mut pool, Some(dir.path())).await.unwrap();
    assert_eq!(
        plan,
        vec![
            MigrationStatus {
                name: "001_a".into(),
                applied: true,
            },
            MigrationStatus {
                name: "002_b".into(),
                applied: false,
            },
        ]
    );
    assert!(!table_exists(&pool, "b").await);
}

#[tokio::test]
async fn comment_only_file_is_recorded() {
    let dir = tempdir().unwrap();
    write_migrations(dir.path(), &[("001_placeholder.sql", "-- reserved\n;\n-- nothing yet\n")]);
    let pool = temp_pool().await;

    let mut spy = SpyTarget::new(pool.clone());
    let report = migrate::run_migrations(&mut spy, Some(dir.path())).await.unwrap();
    assert_eq!(report.applied, vec!["001_placeholder"]);
    assert!(!spy.saw("reserved"));
}
