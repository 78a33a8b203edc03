//! Soft-delete tombstone state carried by every participating record.
//!
//! # Responsibility
//! - Hold the persisted soft-delete columns of one record.
//! - Provide the alive/deleted transitions and invariant checks.
//!
//! # Invariants
//! - `is_deleted == true` iff `deleted_at` is set.
//! - `restored_at` is cleared when a record is soft-deleted.
//! - `deletion_batch` is set only while a record is deleted.

use crate::error::{StoreError, StoreResult};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Identifier shared by every record soft-deleted in one cascading call.
pub type DeletionBatchId = Uuid;

/// Persisted soft-delete columns of one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDeleteState {
    /// Tombstone flag; source of truth for view membership.
    pub is_deleted: bool,
    /// Unix epoch milliseconds of the soft delete.
    pub deleted_at: Option<i64>,
    /// Unix epoch milliseconds of the last restore.
    pub restored_at: Option<i64>,
    /// Cascade batch the record was deleted in.
    pub deletion_batch: Option<DeletionBatchId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateValidationError {
    #[error("record is flagged deleted but has no deleted_at timestamp")]
    DeletedWithoutTimestamp,
    #[error("record is alive but carries a deleted_at timestamp")]
    TimestampWithoutDeleted,
    #[error("record is alive but carries a deletion batch")]
    BatchWithoutDeleted,
}

impl SoftDeleteState {
    /// State of a freshly created record.
    pub fn alive() -> Self {
        Self::default()
    }

    /// Returns whether this record has been restored at least once since its
    /// last soft delete.
    pub fn is_restored(&self) -> bool {
        self.restored_at.is_some()
    }

    pub fn validate(&self) -> Result<(), StateValidationError> {
        match (self.is_deleted, self.deleted_at) {
            (true, None) => return Err(StateValidationError::DeletedWithoutTimestamp),
            (false, Some(_)) => return Err(StateValidationError::TimestampWithoutDeleted),
            _ => {}
        }
        if !self.is_deleted && self.deletion_batch.is_some() {
            return Err(StateValidationError::BatchWithoutDeleted);
        }
        Ok(())
    }

    pub(crate) fn mark_deleted(&mut self, now_ms: i64, batch: DeletionBatchId) {
        self.is_deleted = true;
        self.deleted_at = Some(now_ms);
        self.restored_at = None;
        self.deletion_batch = Some(batch);
    }

    pub(crate) fn mark_restored(&mut self, now_ms: i64) {
        self.is_deleted = false;
        self.deleted_at = None;
        self.restored_at = Some(now_ms);
        self.deletion_batch = None;
    }

    /// Reads the soft-delete columns from a row selected with `*` or with the
    /// four columns named explicitly.
    ///
    /// Persisted rows that break the state invariants are rejected instead of
    /// being masked.
    pub fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        let is_deleted = match row.get::<_, i64>("is_deleted")? {
            0 => false,
            1 => true,
            other => {
                return Err(StoreError::InvalidData(format!(
                    "invalid is_deleted value `{other}`"
                )));
            }
        };

        let deletion_batch = match row.get::<_, Option<String>>("deletion_batch")? {
            Some(text) => Some(Uuid::parse_str(&text).map_err(|_| {
                StoreError::InvalidData(format!("invalid deletion_batch value `{text}`"))
            })?),
            None => None,
        };

        let state = Self {
            is_deleted,
            deleted_at: row.get("deleted_at")?,
            restored_at: row.get("restored_at")?,
            deletion_batch,
        };
        state.validate()?;
        Ok(state)
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
