//! Visibility-filtered read projections over one record type.
//!
//! # Responsibility
//! - Partition records into alive / deleted / unfiltered views.
//! - Offer bulk soft delete, restore and hard delete over a view.
//!
//! # Invariants
//! - Every record is in exactly one of the alive and deleted views, and
//!   always in the unfiltered view until hard-deleted.
//! - Listing is deterministic: explicit ordering first, then `id ASC`.
//! - Column names are validated before they reach SQL; an invalid name is
//!   reported by the first terminal call.

use crate::error::{StoreError, StoreResult};
use crate::model::record::{RecordId, SoftDeletable};
use crate::model::state::{DeletionBatchId, SoftDeleteState};
use crate::repo::store::SoftDeleteStore;
use crate::schema::registry::is_valid_identifier;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Which side of the tombstone flag a view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// `is_deleted = 0`.
    Alive,
    /// `is_deleted = 1`.
    Deleted,
    /// No flag predicate.
    All,
}

impl Visibility {
    fn predicate(self) -> Option<&'static str> {
        match self {
            Self::Alive => Some("is_deleted = 0"),
            Self::Deleted => Some("is_deleted = 1"),
            Self::All => None,
        }
    }

    /// Returns whether a record in `state` belongs to this view.
    pub fn contains(self, state: &SoftDeleteState) -> bool {
        match self {
            Self::Alive => !state.is_deleted,
            Self::Deleted => state.is_deleted,
            Self::All => true,
        }
    }

    /// Parses an `is_deleted` list-filter lookup value.
    ///
    /// `"true"` selects deleted records, `"false"` alive ones, and a missing,
    /// empty or `"all"` value selects everything.
    pub fn from_lookup(value: Option<&str>) -> StoreResult<Self> {
        match value.map(str::trim) {
            None | Some("") | Some("all") => Ok(Self::All),
            Some("true") => Ok(Self::Deleted),
            Some("false") => Ok(Self::Alive),
            Some(other) => Err(StoreError::InvalidFilter(format!(
                "unsupported is_deleted lookup `{other}`; expected true|false|all"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Deleted => "deleted",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone)]
enum Condition {
    Eq(String, Value),
    Null(String),
    NotNull(String),
}

/// Lazily evaluated, filterable view over the records of `M`.
pub struct View<'s, M> {
    store: &'s SoftDeleteStore<'s>,
    visibility: Visibility,
    conditions: Vec<Condition>,
    ordering: Vec<(String, bool)>,
    limit: Option<u32>,
    offset: u32,
    invalid: Option<String>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for View<'_, M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            visibility: self.visibility,
            conditions: self.conditions.clone(),
            ordering: self.ordering.clone(),
            limit: self.limit,
            offset: self.offset,
            invalid: self.invalid.clone(),
            _model: PhantomData,
        }
    }
}

impl<'s, M: SoftDeletable> View<'s, M> {
    pub(crate) fn new(store: &'s SoftDeleteStore<'s>, visibility: Visibility) -> Self {
        Self {
            store,
            visibility,
            conditions: Vec::new(),
            ordering: Vec::new(),
            limit: None,
            offset: 0,
            invalid: None,
            _model: PhantomData,
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Keeps records whose `column` equals `value`. Use `filter_null` for
    /// `NULL` comparisons.
    pub fn filter_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        if self.accept_column(column) {
            self.conditions
                .push(Condition::Eq(column.to_string(), value.into()));
        }
        self
    }

    pub fn filter_null(mut self, column: &str) -> Self {
        if self.accept_column(column) {
            self.conditions.push(Condition::Null(column.to_string()));
        }
        self
    }

    pub fn filter_not_null(mut self, column: &str) -> Self {
        if self.accept_column(column) {
            self.conditions.push(Condition::NotNull(column.to_string()));
        }
        self
    }

    /// Keeps records soft-deleted by one cascading call.
    pub fn in_batch(self, batch: DeletionBatchId) -> Self {
        self.filter_eq("deletion_batch", batch.to_string())
    }

    pub fn order_by(mut self, column: &str) -> Self {
        if self.accept_column(column) {
            self.ordering.push((column.to_string(), false));
        }
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        if self.accept_column(column) {
            self.ordering.push((column.to_string(), true));
        }
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn fetch(&self) -> StoreResult<Vec<M>> {
        let (sql, bind_values) = self.select_sql("*", self.limit)?;
        let mut stmt = self.store.connection().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(M::from_row(row)?);
        }
        Ok(records)
    }

    pub fn first(&self) -> StoreResult<Option<M>> {
        let (sql, bind_values) = self.select_sql("*", Some(1))?;
        let mut stmt = self.store.connection().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        if let Some(row) = rows.next()? {
            return Ok(Some(M::from_row(row)?));
        }
        Ok(None)
    }

    /// Loads one record by id if it is visible through this view.
    pub fn get(&self, id: RecordId) -> StoreResult<Option<M>> {
        self.clone().filter_eq("id", id).first()
    }

    pub fn ids(&self) -> StoreResult<Vec<RecordId>> {
        let (sql, bind_values) = self.select_sql("id", self.limit)?;
        let mut stmt = self.store.connection().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    pub fn count(&self) -> StoreResult<usize> {
        let (sql, bind_values) = self.select_sql("id", self.limit)?;
        let count: i64 = self.store.connection().query_row(
            &format!("SELECT COUNT(*) FROM ({sql});"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn exists(&self) -> StoreResult<bool> {
        Ok(self.first()?.is_some())
    }

    /// Soft-deletes every record in this view, one by one, with cascade.
    pub fn soft_delete(&self) -> StoreResult<usize> {
        self.store.soft_delete_bulk(self)
    }

    /// Restores every deleted record in this view, one by one.
    pub fn restore(&self) -> StoreResult<usize> {
        self.store.restore_bulk(self)
    }

    /// Hard-deletes every record in this view, one by one.
    pub fn hard_delete(&self) -> StoreResult<usize> {
        self.store.hard_delete_bulk(self)
    }

    fn accept_column(&mut self, column: &str) -> bool {
        if is_valid_identifier(column) {
            return true;
        }
        if self.invalid.is_none() {
            self.invalid = Some(format!("invalid column name `{column}`"));
        }
        false
    }

    fn select_sql(&self, projection: &str, limit: Option<u32>) -> StoreResult<(String, Vec<Value>)> {
        if let Some(message) = &self.invalid {
            return Err(StoreError::InvalidFilter(message.clone()));
        }
        let table = self.store.registry().require(M::MODEL.table)?.table;

        let mut sql = format!("SELECT {projection} FROM {table} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(predicate) = self.visibility.predicate() {
            sql.push_str(" AND ");
            sql.push_str(predicate);
        }

        for condition in &self.conditions {
            match condition {
                Condition::Eq(column, value) => {
                    sql.push_str(&format!(" AND {column} = ?"));
                    bind_values.push(value.clone());
                }
                Condition::Null(column) => sql.push_str(&format!(" AND {column} IS NULL")),
                Condition::NotNull(column) => {
                    sql.push_str(&format!(" AND {column} IS NOT NULL"))
                }
            }
        }

        sql.push_str(" ORDER BY ");
        for (column, descending) in &self.ordering {
            sql.push_str(column);
            sql.push_str(if *descending { " DESC, " } else { " ASC, " });
        }
        sql.push_str("id ASC");

        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if self.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(self.offset)));
            }
        } else if self.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(self.offset)));
        }

        Ok((sql, bind_values))
    }
}
