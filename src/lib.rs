//! Schema migrations for the farmops backend.
//!
//! The application calls [`migrate::run_pending`] once at startup and
//! refuses to serve traffic if it fails.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod sql_split;

pub use config::Config;
pub use db::{Database, Dialect, MigrationTarget};
pub use error::{DatabaseErrorKind, MigrationError};
pub use logging::init_logging;
pub use migrate::{run_migrations, run_pending, MigrationReport};
