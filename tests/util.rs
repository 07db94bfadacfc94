#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use farmops_lib::{Dialect, MigrationTarget};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub async fn temp_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:")
}

pub fn write_migrations(dir: &Path, files: &[(&str, &str)]) {
    for (name, sql) in files {
        fs::write(dir.join(name), sql).unwrap();
    }
}

pub async fn ledger_names(pool: &SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM schema_migrations ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}

pub async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?")
            .bind(name)
            .fetch_optional(pool)
            .await
            .unwrap();
    found.is_some()
}

/// Records every statement handed to the database and can refuse ledger
/// inserts.
pub struct SpyTarget {
    pub pool: SqlitePool,
    pub executed: Vec<String>,
    pub fail_ledger_insert: bool,
}

impl SpyTarget {
    pub fn new(pool: SqlitePool) -> Self {
        SpyTarget {
            pool,
            executed: Vec::new(),
            fail_ledger_insert: false,
        }
    }

    pub fn saw(&self, fragment: &str) -> bool {
        self.executed.iter().any(|sql| sql.contains(fragment))
    }
}

#[async_trait]
impl MigrationTarget for SpyTarget {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute_sql(&mut self, sql: &str, params: &[&str]) -> Result<u64, sqlx::Error> {
        self.executed.push(sql.to_string());
        if self.fail_ledger_insert && sql.starts_with("INSERT INTO schema_migrations") {
            return Err(sqlx::Error::Protocol("ledger unavailable".into()));
        }
        self.pool.execute_sql(sql, params).await
    }

    async fn query_strings(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> Result<Vec<String>, sqlx::Error> {
        self.pool.query_strings(sql, params).await
    }
}
