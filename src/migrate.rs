use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::db::MigrationTarget;
use crate::error::{classify, DatabaseErrorKind, MigrationError, Result};
use crate::sql_split::split_statements;

const MIGRATION_EXT: &str = "sql";
const PREVIEW_CHARS: usize = 200;

/// One `.sql` file in the migrations directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name without the `.sql` extension; the ledger key.
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub name: String,
    pub applied: bool,
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    /// Statements that failed with "already exists" and were passed over.
    pub tolerated: usize,
    /// Migrations whose statements ran but whose ledger row could not be
    /// written. They run again next time.
    pub unrecorded: Vec<String>,
}

/// Outcome of writing the ledger row after a migration's statements ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    Recorded,
    Failed(String),
}

pub fn statement_preview(sql: &str) -> String {
    let one_line = sql.replace(['\n', '\r', '\t'], " ");
    let trimmed = one_line.trim();
    if trimmed.chars().count() > PREVIEW_CHARS {
        let cut: String = trimmed.chars().take(PREVIEW_CHARS - 1).collect();
        format!("{cut}…")
    } else {
        trimmed.to_string()
    }
}

/// Locate `relative` next to the running executable, falling back to the
/// working directory. `None` when neither is an existing directory.
pub fn resolve_migrations_dir(relative: &Path) -> Option<PathBuf> {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(relative)));
    let from_cwd = std::env::current_dir().ok().map(|cwd| cwd.join(relative));

    beside_exe
        .into_iter()
        .chain(from_cwd)
        .find(|candidate| candidate.is_dir())
}

/// List the `.sql` files in `dir`, sorted by file name. That order is the
/// application order.
pub fn discover_migrations(dir: &Path) -> Result<Vec<MigrationFile>> {
    let entries = fs::read_dir(dir).map_err(|source| MigrationError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| MigrationError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(MIGRATION_EXT) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        files.push(MigrationFile {
            name: name.to_string(),
            path,
        });
    }
    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(files)
}

pub async fn ensure_ledger<T: MigrationTarget + ?Sized>(target: &mut T) -> Result<()> {
    let ddl = target.dialect().create_ledger_sql();
    target
        .execute_sql(ddl, &[])
        .await
        .map_err(MigrationError::Ledger)?;
    Ok(())
}

pub async fn is_applied<T: MigrationTarget + ?Sized>(target: &mut T, name: &str) -> Result<bool> {
    let sql = target.dialect().find_applied_sql();
    let rows = target
        .query_strings(&sql, &[name])
        .await
        .map_err(|source| MigrationError::LedgerQuery {
            migration: name.to_string(),
            source,
        })?;
    Ok(!rows.is_empty())
}

async fn record_applied<T: MigrationTarget + ?Sized>(target: &mut T, name: &str) -> LedgerWrite {
    let sql = target.dialect().record_applied_sql();
    match target.execute_sql(&sql, &[name]).await {
        Ok(_) => LedgerWrite::Recorded,
        Err(e) => LedgerWrite::Failed(e.to_string()),
    }
}

/// Apply every migration in `dir` that the ledger does not list yet.
///
/// `None` or a missing directory is zero migrations, not an error. Any
/// statement failure other than "already exists" stops the run; migrations
/// applied before it stay recorded.
pub async fn run_migrations<T: MigrationTarget + ?Sized>(
    target: &mut T,
    dir: Option<&Path>,
) -> Result<MigrationReport> {
    ensure_ledger(target).await?;

    let mut report = MigrationReport::default();
    let Some(dir) = dir.filter(|d| d.is_dir()) else {
        info!(
            target: "farmops",
            event = "migration_dir_missing",
            dir = %dir.map(|d| d.display().to_string()).unwrap_or_default()
        );
        return Ok(report);
    };

    for file in discover_migrations(dir)? {
        if is_applied(target, &file.name).await? {
            debug!(target: "farmops", event = "migration_skip_file", file = %file.name);
            report.skipped.push(file.name);
            continue;
        }
        report.tolerated += apply_file(target, &file).await?;

        match record_applied(target, &file.name).await {
            LedgerWrite::Recorded => {
                info!(target: "farmops", event = "migration_file_applied", file = %file.name);
                report.applied.push(file.name);
            }
            LedgerWrite::Failed(reason) => {
                debug!(
                    target: "farmops",
                    event = "migration_ledger_write_failed",
                    file = %file.name,
                    error = %reason
                );
                report.unrecorded.push(file.name);
            }
        }
    }

    info!(
        target: "farmops",
        event = "migration_run_complete",
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        tolerated = report.tolerated,
        unrecorded = report.unrecorded.len()
    );
    Ok(report)
}

/// Execute one file's statements in order. Returns how many were tolerated.
async fn apply_file<T: MigrationTarget + ?Sized>(
    target: &mut T,
    file: &MigrationFile,
) -> Result<usize> {
    let sql = fs::read_to_string(&file.path).map_err(|source| MigrationError::ReadFile {
        path: file.path.clone(),
        source,
    })?;

    let mut tolerated = 0;
    for (i, stmt) in split_statements(&sql).iter().enumerate() {
        let index = i + 1;
        debug!(
            target: "farmops",
            event = "migration_stmt",
            file = %file.name,
            index,
            sql = %statement_preview(stmt)
        );
        let Err(e) = target.execute_sql(stmt, &[]).await else {
            continue;
        };
        match classify(&e) {
            DatabaseErrorKind::ObjectAlreadyExists => {
                warn!(
                    target: "farmops",
                    event = "migration_stmt_tolerated",
                    file = %file.name,
                    index,
                    error = %e
                );
                tolerated += 1;
            }
            DatabaseErrorKind::Other => {
                let preview = statement_preview(stmt);
                error!(
                    target: "farmops",
                    event = "migration_stmt_error",
                    file = %file.name,
                    index,
                    sql = %preview,
                    error = %e
                );
                return Err(MigrationError::Statement {
                    migration: file.name.clone(),
                    index,
                    preview,
                    source: e,
                });
            }
        }
    }
    Ok(tolerated)
}

/// Startup entry point: resolve `relative` and apply what is pending.
pub async fn run_pending<T: MigrationTarget + ?Sized>(
    target: &mut T,
    relative: &Path,
) -> Result<MigrationReport> {
    let dir = resolve_migrations_dir(relative);
    run_migrations(target, dir.as_deref()).await
}

/// Every migration in `dir` with its applied flag. Creates the ledger if it
/// is missing but executes nothing else.
pub async fn plan_migrations<T: MigrationTarget + ?Sized>(
    target: &mut T,
    dir: Option<&Path>,
) -> Result<Vec<MigrationStatus>> {
    ensure_ledger(target).await?;
    let Some(dir) = dir.filter(|d| d.is_dir()) else {
        return Ok(Vec::new());
    };

    let sql = target.dialect().list_applied_sql();
    let applied = target
        .query_strings(&sql, &[])
        .await
        .map_err(MigrationError::Ledger)?;

    Ok(discover_migrations(dir)?
        .into_iter()
        .map(|file| MigrationStatus {
            applied: applied.contains(&file.name),
            name: file.name,
        })
        .collect())
}
