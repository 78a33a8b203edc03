//! DDL helpers for opting an existing table into soft-delete semantics.

/// Soft-delete columns every participating table must carry.
pub const SOFT_DELETE_COLUMNS: [&str; 4] =
    ["is_deleted", "deleted_at", "restored_at", "deletion_batch"];

/// Returns the statements that add soft-delete columns to `table`.
///
/// Intended to be embedded in a host migration. `table` must be a plain
/// SQL identifier; callers pass compile-time table names.
pub fn soft_delete_columns_ddl(table: &str) -> String {
    format!(
        "ALTER TABLE {table} ADD COLUMN is_deleted INTEGER NOT NULL DEFAULT 0;
ALTER TABLE {table} ADD COLUMN deleted_at INTEGER;
ALTER TABLE {table} ADD COLUMN restored_at INTEGER;
ALTER TABLE {table} ADD COLUMN deletion_batch TEXT;
CREATE INDEX IF NOT EXISTS idx_{table}_is_deleted ON {table}(is_deleted);"
    )
}
