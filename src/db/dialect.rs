/// Name of the ledger table. Shared with every other deployment of the
/// farmops schema, so it must not change.
pub const LEDGER_TABLE: &str = "schema_migrations";

/// SQL flavour of a [`MigrationTarget`](super::MigrationTarget).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Positional placeholder for the first bound parameter.
    pub fn placeholder(self) -> &'static str {
        match self {
            Dialect::Postgres => "$1",
            Dialect::Sqlite => "?",
        }
    }

    pub fn create_ledger_sql(self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "CREATE TABLE IF NOT EXISTS schema_migrations (\
                   id         SERIAL PRIMARY KEY,\
                   name       VARCHAR(255) UNIQUE NOT NULL,\
                   applied_at TIMESTAMP NOT NULL DEFAULT now()\
                 )"
            }
            Dialect::Sqlite => {
                "CREATE TABLE IF NOT EXISTS schema_migrations (\
                   id         INTEGER PRIMARY KEY AUTOINCREMENT,\
                   name       VARCHAR(255) UNIQUE NOT NULL,\
                   applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\
                 )"
            }
        }
    }

    pub fn find_applied_sql(self) -> String {
        format!(
            "SELECT name FROM {LEDGER_TABLE} WHERE name = {}",
            self.placeholder()
        )
    }

    pub fn list_applied_sql(self) -> String {
        format!("SELECT name FROM {LEDGER_TABLE} ORDER BY name")
    }

    pub fn record_applied_sql(self) -> String {
        format!(
            "INSERT INTO {LEDGER_TABLE} (name) VALUES ({})",
            self.placeholder()
        )
    }
}
