//! SQLite storage bootstrap, transaction scopes and schema helpers.
//!
//! # Responsibility
//! - Open and configure SQLite connections used as the host record store.
//! - Apply caller-provided schema migrations in deterministic order.
//! - Provide the atomic scope every cascading write runs in.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Store code must not read/write record data before migrations succeed.

use thiserror::Error;

mod atomic;
pub mod migrations;
mod open;
pub mod schema;

pub use atomic::atomic;
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("migration version {version} must be greater than previous version {previous}")]
    InvalidMigrationOrder { previous: u32, version: u32 },
}
