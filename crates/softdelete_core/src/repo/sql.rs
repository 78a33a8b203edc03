//! Row-level SQL shared by cascade, collector and store.
//!
//! Table and column names come from registered descriptors, which only hold
//! validated identifiers.

use crate::error::StoreResult;
use crate::model::record::RecordId;
use crate::model::state::SoftDeleteState;
use crate::schema::descriptor::Edge;
use rusqlite::{params, Connection, OptionalExtension};

/// Which dependent rows to select along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DependentFilter {
    Any,
    /// Non-participating dependents have no flag, so all their rows count.
    Alive,
    Deleted,
}

pub(crate) fn load_state(
    conn: &Connection,
    table: &str,
    id: RecordId,
) -> StoreResult<Option<SoftDeleteState>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT is_deleted, deleted_at, restored_at, deletion_batch
         FROM {table}
         WHERE id = ?1;"
    ))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(SoftDeleteState::from_row(row)?));
    }
    Ok(None)
}

pub(crate) fn write_state(
    conn: &Connection,
    table: &str,
    id: RecordId,
    state: &SoftDeleteState,
) -> StoreResult<()> {
    conn.execute(
        &format!(
            "UPDATE {table}
             SET is_deleted = ?2,
                 deleted_at = ?3,
                 restored_at = ?4,
                 deletion_batch = ?5
             WHERE id = ?1;"
        ),
        params![
            id,
            state.is_deleted,
            state.deleted_at,
            state.restored_at,
            state.deletion_batch.map(|batch| batch.to_string()),
        ],
    )?;
    Ok(())
}

pub(crate) fn record_exists(conn: &Connection, table: &str, id: RecordId) -> StoreResult<bool> {
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1;"),
            [id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn dependent_ids(
    conn: &Connection,
    edge: &Edge,
    parent_id: RecordId,
    filter: DependentFilter,
) -> StoreResult<Vec<RecordId>> {
    let flag_predicate = match (filter, edge.dependent_soft_delete) {
        (DependentFilter::Any, _) | (DependentFilter::Alive, false) => "",
        (DependentFilter::Alive, true) => " AND is_deleted = 0",
        (DependentFilter::Deleted, true) => " AND is_deleted = 1",
        (DependentFilter::Deleted, false) => return Ok(Vec::new()),
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT id
         FROM {dependent}
         WHERE {column} = ?1{flag_predicate}
         ORDER BY id ASC;",
        dependent = edge.dependent,
        column = edge.column,
    ))?;
    let mut rows = stmt.query([parent_id])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

pub(crate) fn clear_reference(
    conn: &Connection,
    edge: &Edge,
    parent_id: RecordId,
) -> StoreResult<usize> {
    let changed = conn.execute(
        &format!(
            "UPDATE {dependent} SET {column} = NULL WHERE {column} = ?1;",
            dependent = edge.dependent,
            column = edge.column,
        ),
        [parent_id],
    )?;
    Ok(changed)
}

/// Resets the reference to the column's declared default, or `NULL` when
/// none is declared.
pub(crate) fn reset_reference(
    conn: &Connection,
    edge: &Edge,
    parent_id: RecordId,
) -> StoreResult<usize> {
    let default = column_default(conn, edge.dependent, edge.column)?;
    let value = default.as_deref().unwrap_or("NULL");
    let changed = conn.execute(
        &format!(
            "UPDATE {dependent} SET {column} = ({value}) WHERE {column} = ?1;",
            dependent = edge.dependent,
            column = edge.column,
        ),
        [parent_id],
    )?;
    Ok(changed)
}

/// Default expression of `table.column` as written in the schema.
fn column_default(conn: &Connection, table: &str, column: &str) -> StoreResult<Option<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get("name")?;
        if name == column {
            return Ok(row.get("dflt_value")?);
        }
    }
    Ok(None)
}

/// Row ids of `edge.dependent` that SQLite reports as violating a declared
/// foreign key towards `edge.parent`.
pub(crate) fn foreign_key_violations(conn: &Connection, edge: &Edge) -> StoreResult<Vec<RecordId>> {
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_check({});", edge.dependent))?;
    let mut rows = stmt.query([])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let parent: String = row.get(2)?;
        let rowid: Option<RecordId> = row.get(1)?;
        if parent == edge.parent {
            ids.extend(rowid);
        }
    }
    Ok(ids)
}

pub(crate) fn delete_row(conn: &Connection, table: &str, id: RecordId) -> StoreResult<usize> {
    let changed = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1;"), [id])?;
    Ok(changed)
}
