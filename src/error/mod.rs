use std::io::Error as IoError;
use std::path::PathBuf;

use sqlx::Error as SqlxError;
use thiserror::Error;

mod kind;

pub use kind::{
    classify, classify_parts, DatabaseErrorKind, PG_DUPLICATE_OBJECT, PG_DUPLICATE_TABLE,
};

pub type Result<T> = std::result::Result<T, MigrationError>;

/// Failures that abort a migration run.
///
/// Tolerated conditions (a missing directory, an "already exists" statement,
/// a failed ledger insert) never surface here.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to prepare migration ledger: {0}")]
    Ledger(#[source] SqlxError),

    #[error("failed to query migration ledger for {migration}: {source}")]
    LedgerQuery {
        migration: String,
        #[source]
        source: SqlxError,
    },

    #[error("failed to read migrations directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("failed to read migration file {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("migration {migration} failed at statement {index} ({preview}): {source}")]
    Statement {
        migration: String,
        index: usize,
        preview: String,
        #[source]
        source: SqlxError,
    },
}

impl MigrationError {
    /// Name of the migration the failure belongs to, if any.
    pub fn migration(&self) -> Option<&str> {
        match self {
            MigrationError::LedgerQuery { migration, .. }
            | MigrationError::Statement { migration, .. } => Some(migration),
            _ => None,
        }
    }

    pub fn database_kind(&self) -> Option<DatabaseErrorKind> {
        match self {
            MigrationError::Ledger(source)
            | MigrationError::LedgerQuery { source, .. }
            | MigrationError::Statement { source, .. } => Some(classify(source)),
            _ => None,
        }
    }
}
