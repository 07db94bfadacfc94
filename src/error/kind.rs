use sqlx::Error as SqlxError;

/// PostgreSQL `duplicate_table`.
pub const PG_DUPLICATE_TABLE: &str = "42P07";
/// PostgreSQL `duplicate_object` (constraints, types, indexes by name).
pub const PG_DUPLICATE_OBJECT: &str = "42710";

const ALREADY_EXISTS: &str = "already exists";

/// Driver errors reduced to what the migration runner acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// The statement tried to create something that is already there.
    ObjectAlreadyExists,
    Other,
}

/// Classify a sqlx error. Only errors reported by the database server can be
/// `ObjectAlreadyExists`; pool, IO and protocol failures are always `Other`.
pub fn classify(error: &SqlxError) -> DatabaseErrorKind {
    match error {
        SqlxError::Database(db) => classify_parts(db.code().as_deref(), db.message()),
        _ => DatabaseErrorKind::Other,
    }
}

/// The classification rule on its own, for a driver code and message.
///
/// PostgreSQL reports `42P07`/`42710`. SQLite has no dedicated code and says
/// `table x already exists`, so the message is checked for every engine.
pub fn classify_parts(code: Option<&str>, message: &str) -> DatabaseErrorKind {
    if matches!(code, Some(PG_DUPLICATE_TABLE) | Some(PG_DUPLICATE_OBJECT)) {
        return DatabaseErrorKind::ObjectAlreadyExists;
    }
    if message.to_ascii_lowercase().contains(ALREADY_EXISTS) {
        return DatabaseErrorKind::ObjectAlreadyExists;
    }
    DatabaseErrorKind::Other
}
