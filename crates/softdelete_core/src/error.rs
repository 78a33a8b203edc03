//! Store-level error taxonomy.
//!
//! Host-store failures (SQLite constraint violations, busy errors) surface
//! unchanged inside `StoreError::Db`.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::model::record::RecordId;
use crate::model::state::StateValidationError;
use crate::schema::descriptor::OnDelete;
use crate::schema::registry::RelationshipError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    /// Relationship metadata could not be resolved during traversal.
    #[error("relationship introspection failed: {0}")]
    RelationshipIntrospection(#[from] RelationshipError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid soft-delete state: {0}")]
    Validation(#[from] StateValidationError),
    /// Hard delete blocked by alive dependents on a protect/restrict edge.
    #[error(
        "cannot delete `{table}` record {id}: {} alive `{dependent}` record(s) reference it through `{column}` ({on_delete})",
        .dependent_ids.len()
    )]
    ProtectedReference {
        table: &'static str,
        id: RecordId,
        dependent: &'static str,
        column: &'static str,
        on_delete: OnDelete,
        dependent_ids: Vec<RecordId>,
    },
    #[error("`{table}` record not found: {id}")]
    NotFound { table: &'static str, id: RecordId },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("invalid view filter: {0}")]
    InvalidFilter(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
