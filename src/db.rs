use std::str::FromStr;

use anyhow::{anyhow, Context, Result as AnyResult};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, Executor, PgPool, Row, SqlitePool};

mod dialect;

pub use dialect::{Dialect, LEDGER_TABLE};

/// The database handle a migration run talks to.
///
/// Two calls cover everything the runner needs: execute a statement and
/// fetch rows, each with positional string parameters.
#[async_trait]
pub trait MigrationTarget: Send {
    fn dialect(&self) -> Dialect;

    /// Execute one statement, returning the number of affected rows.
    async fn execute_sql(&mut self, sql: &str, params: &[&str]) -> Result<u64, sqlx::Error>;

    /// Run a query and return the first column of every row as text.
    async fn query_strings(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> Result<Vec<String>, sqlx::Error>;
}

macro_rules! impl_pool_target {
    ($pool:ty, $dialect:expr) => {
        #[async_trait]
        impl MigrationTarget for $pool {
            fn dialect(&self) -> Dialect {
                $dialect
            }

            async fn execute_sql(
                &mut self,
                sql: &str,
                params: &[&str],
            ) -> Result<u64, sqlx::Error> {
                let pool = &*self;
                if params.is_empty() {
                    // Unprepared: DDL and DO blocks go through the simple protocol.
                    let done = pool.execute(sql).await?;
                    return Ok(done.rows_affected());
                }
                let mut query = sqlx::query(sql);
                for param in params {
                    query = query.bind(param.to_string());
                }
                Ok(query.execute(pool).await?.rows_affected())
            }

            async fn query_strings(
                &mut self,
                sql: &str,
                params: &[&str],
            ) -> Result<Vec<String>, sqlx::Error> {
                let pool = &*self;
                let mut query = sqlx::query(sql);
                for param in params {
                    query = query.bind(param.to_string());
                }
                let rows = query.fetch_all(pool).await?;
                rows.iter().map(|row| row.try_get::<String, _>(0)).collect()
            }
        }
    };
}

impl_pool_target!(PgPool, Dialect::Postgres);
impl_pool_target!(SqlitePool, Dialect::Sqlite);

/// A connected database, PostgreSQL in production and SQLite for local runs.
#[derive(Debug, Clone)]
pub enum Database {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl Database {
    /// Open a single-connection pool for `url`, choosing the driver by scheme.
    pub async fn connect(url: &str) -> AnyResult<Self> {
        let db = if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Database::Postgres(open_postgres_pool(url).await?)
        } else if url.starts_with("sqlite:") {
            Database::Sqlite(open_sqlite_pool(url).await?)
        } else {
            return Err(anyhow!(
                "unsupported database url scheme (expected postgres:// or sqlite:): {}",
                redact_url(url)
            ));
        };
        log_server_version(&db).await;
        Ok(db)
    }

    pub async fn close(&self) {
        match self {
            Database::Postgres(pool) => pool.close().await,
            Database::Sqlite(pool) => pool.close().await,
        }
    }
}

#[async_trait]
impl MigrationTarget for Database {
    fn dialect(&self) -> Dialect {
        match self {
            Database::Postgres(_) => Dialect::Postgres,
            Database::Sqlite(_) => Dialect::Sqlite,
        }
    }

    async fn execute_sql(&mut self, sql: &str, params: &[&str]) -> Result<u64, sqlx::Error> {
        match self {
            Database::Postgres(pool) => pool.execute_sql(sql, params).await,
            Database::Sqlite(pool) => pool.execute_sql(sql, params).await,
        }
    }

    async fn query_strings(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> Result<Vec<String>, sqlx::Error> {
        match self {
            Database::Postgres(pool) => pool.query_strings(sql, params).await,
            Database::Sqlite(pool) => pool.query_strings(sql, params).await,
        }
    }
}

async fn open_postgres_pool(url: &str) -> AnyResult<PgPool> {
    let opts = PgConnectOptions::from_str(url)
        .with_context(|| format!("parse postgres url {}", redact_url(url)))?
        .log_statements(log::LevelFilter::Off);
    PgPoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .with_context(|| format!("connect to {}", redact_url(url)))
}

async fn open_sqlite_pool(url: &str) -> AnyResult<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("parse sqlite url {url}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true)
        .log_statements(log::LevelFilter::Off);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .with_context(|| format!("open sqlite database {url}"))?;
    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(&pool)
        .await
        .ok();
    Ok(pool)
}

async fn log_server_version(db: &Database) {
    let version: String = match db {
        Database::Postgres(pool) => sqlx::query_scalar("SHOW server_version")
            .fetch_one(pool)
            .await
            .unwrap_or_else(|_| String::from("unknown")),
        Database::Sqlite(pool) => sqlx::query_scalar("select sqlite_version()")
            .fetch_one(pool)
            .await
            .unwrap_or_else(|_| String::from("unknown")),
    };
    tracing::info!(
        target: "farmops",
        event = "db_open",
        dialect = db.dialect().name(),
        server_version = %version
    );
}

/// Strip the password from a connection url before it reaches a log line.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.split_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => url.to_string(),
    }
}
