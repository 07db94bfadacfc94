use std::path::PathBuf;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const MIGRATIONS_DIR_ENV: &str = "FARMOPS_MIGRATIONS_DIR";
pub const LOG_FILTER_ENV: &str = "FARMOPS_LOG";
pub const LOG_DIR_ENV: &str = "FARMOPS_LOG_DIR";

pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
pub const DEFAULT_LOG_FILTER: &str = "farmops=info,sqlx=warn";

/// Runtime settings, read from the environment (and `.env` via dotenvy in
/// the binaries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: Option<String>,
    /// Relative paths are resolved beside the executable first, then the
    /// working directory.
    pub migrations_dir: PathBuf,
    pub log_filter: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: None,
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();
        Config {
            database_url: get(DATABASE_URL_ENV),
            migrations_dir: get(MIGRATIONS_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.migrations_dir),
            log_filter: get(LOG_FILTER_ENV).unwrap_or(defaults.log_filter),
            log_dir: get(LOG_DIR_ENV).map(PathBuf::from),
        }
    }
}
