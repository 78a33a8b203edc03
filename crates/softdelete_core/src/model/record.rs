//! Capability contract for record types that opt into soft delete.

use crate::error::StoreResult;
use crate::model::state::SoftDeleteState;
use crate::repo::store::SoftDeleteStore;
use crate::schema::descriptor::ModelDescriptor;
use rusqlite::Row;

/// Primary key of a record (`id INTEGER PRIMARY KEY`).
pub type RecordId = i64;

/// A record type with visibility-partitioned (alive/deleted) semantics.
///
/// Implementors declare their table and outgoing foreign keys statically in
/// `MODEL`; cascade traversal consults the registered descriptors instead of
/// reflecting over the type. No base type is required.
pub trait SoftDeletable: Sized {
    /// Static table and relationship declaration.
    const MODEL: ModelDescriptor;

    /// Builds one record from a `SELECT *` row of `MODEL.table`.
    fn from_row(row: &Row<'_>) -> StoreResult<Self>;

    fn id(&self) -> RecordId;

    fn state(&self) -> &SoftDeleteState;

    fn state_mut(&mut self) -> &mut SoftDeleteState;

    fn is_deleted(&self) -> bool {
        self.state().is_deleted
    }

    /// Soft-deletes this record and its cascade dependents.
    ///
    /// Returns the number of records flipped to deleted.
    fn soft_delete(&mut self, store: &SoftDeleteStore<'_>) -> StoreResult<usize> {
        store.soft_delete(self)
    }

    /// Restores this record only; dependents are left as they are.
    fn restore(&mut self, store: &SoftDeleteStore<'_>) -> StoreResult<bool> {
        store.restore(self)
    }

    /// Physically removes this record through the native deletion pipeline.
    fn hard_delete(self, store: &SoftDeleteStore<'_>) -> StoreResult<usize> {
        store.hard_delete(self)
    }
}
