//! Registry of record descriptors and reverse relationship lookup.
//!
//! # Responsibility
//! - Hold every record type the store may traverse during cascade.
//! - Resolve parent -> dependent edges from declared foreign keys.
//! - Check declarations against the live SQLite schema.
//!
//! # Invariants
//! - Table and column names are plain SQL identifiers.
//! - Every foreign key references a registered table once `validate` passes.
//! - Edge order is deterministic: dependent table name, then declaration order.

use crate::db::schema::SOFT_DELETE_COLUMNS;
use crate::error::StoreResult;
use crate::model::record::SoftDeletable;
use crate::schema::descriptor::{Edge, ModelDescriptor};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
});

/// Returns whether `value` can be interpolated into SQL as an identifier.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER.is_match(value)
}

/// Relationship metadata could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationshipError {
    #[error("model is not registered: {0}")]
    UnknownModel(String),
    #[error("`{table}.{column}` references unregistered model `{references}`")]
    UnknownReference {
        table: &'static str,
        column: &'static str,
        references: &'static str,
    },
    #[error("model already registered: {0}")]
    DuplicateModel(&'static str),
    #[error("invalid SQL identifier: `{0}`")]
    InvalidIdentifier(String),
    #[error("relation `{0}` is not declared by any registered model")]
    UnknownRelation(String),
    #[error("table `{0}` does not exist")]
    MissingTable(&'static str),
    #[error("column `{column}` does not exist in table `{table}`")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
    #[error("model `{0}` does not participate in soft delete")]
    NotSoftDeletable(&'static str),
    #[error(
        "`{dependent}.{column}` cascades from `{parent}` but `{dependent}` does not participate in soft delete"
    )]
    NonSoftDeletableDependent {
        parent: &'static str,
        dependent: &'static str,
        column: &'static str,
    },
}

/// Registered record descriptors keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<&'static str, ModelDescriptor>,
    excluded_relations: BTreeSet<String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one soft-deletable record type.
    pub fn register<M: SoftDeletable>(&mut self) -> Result<(), RelationshipError> {
        if !M::MODEL.soft_delete {
            return Err(RelationshipError::NotSoftDeletable(M::MODEL.table));
        }
        self.register_descriptor(M::MODEL)
    }

    /// Registers a descriptor directly. Used for non-participating types that
    /// still take part in native hard-delete resolution.
    pub fn register_descriptor(
        &mut self,
        descriptor: ModelDescriptor,
    ) -> Result<(), RelationshipError> {
        ensure_identifier(descriptor.table)?;
        for foreign_key in descriptor.foreign_keys {
            ensure_identifier(foreign_key.column)?;
            ensure_identifier(foreign_key.references)?;
        }
        if self.models.contains_key(descriptor.table) {
            return Err(RelationshipError::DuplicateModel(descriptor.table));
        }

        self.models.insert(descriptor.table, descriptor);
        Ok(())
    }

    /// Excludes one `table.column` relation from soft-delete cascade.
    ///
    /// Hard delete still resolves the relation natively.
    pub fn exclude_relation(&mut self, relation: &str) -> Result<(), RelationshipError> {
        let normalized = relation.trim();
        let declared = self.models.values().any(|model| {
            model
                .foreign_keys
                .iter()
                .any(|fk| format!("{}.{}", model.table, fk.column) == normalized)
        });
        if !declared {
            return Err(RelationshipError::UnknownRelation(normalized.to_string()));
        }
        self.excluded_relations.insert(normalized.to_string());
        Ok(())
    }

    pub fn is_excluded(&self, edge: &Edge) -> bool {
        self.excluded_relations.contains(&edge.relation_key())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Returns sorted registered table names.
    pub fn tables(&self) -> Vec<&'static str> {
        self.models.keys().copied().collect()
    }

    pub fn get(&self, table: &str) -> Option<&ModelDescriptor> {
        self.models.get(table)
    }

    pub fn require(&self, table: &str) -> Result<&ModelDescriptor, RelationshipError> {
        self.get(table)
            .ok_or_else(|| RelationshipError::UnknownModel(table.to_string()))
    }

    /// Like `require`, but also rejects non-participating types.
    pub fn require_soft_deletable(
        &self,
        table: &str,
    ) -> Result<&ModelDescriptor, RelationshipError> {
        let descriptor = self.require(table)?;
        if !descriptor.soft_delete {
            return Err(RelationshipError::NotSoftDeletable(descriptor.table));
        }
        Ok(descriptor)
    }

    /// Checks every foreign key resolves to a registered table.
    pub fn validate(&self) -> Result<(), RelationshipError> {
        for model in self.models.values() {
            for foreign_key in model.foreign_keys {
                if !self.models.contains_key(foreign_key.references) {
                    return Err(RelationshipError::UnknownReference {
                        table: model.table,
                        column: foreign_key.column,
                        references: foreign_key.references,
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks declared tables and columns exist on `conn`.
    pub fn validate_against(&self, conn: &Connection) -> StoreResult<()> {
        for model in self.models.values() {
            let columns = table_columns(conn, model.table)?;
            if columns.is_empty() {
                return Err(RelationshipError::MissingTable(model.table).into());
            }

            let mut required = vec!["id"];
            required.extend(model.foreign_keys.iter().map(|fk| fk.column));
            if model.soft_delete {
                required.extend(SOFT_DELETE_COLUMNS);
            }

            for column in required {
                if !columns.contains(column) {
                    return Err(RelationshipError::MissingColumn {
                        table: model.table,
                        column,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Returns every edge whose parent is `table`.
    pub fn dependents_of(&self, table: &str) -> Result<Vec<Edge>, RelationshipError> {
        let parent = self.require(table)?.table;
        let mut edges = Vec::new();
        for model in self.models.values() {
            for foreign_key in model.foreign_keys {
                if foreign_key.references != parent {
                    continue;
                }
                edges.push(Edge {
                    parent,
                    dependent: model.table,
                    column: foreign_key.column,
                    on_delete: foreign_key.on_delete,
                    dependent_soft_delete: model.soft_delete,
                });
            }
        }
        Ok(edges)
    }
}

fn ensure_identifier(value: &str) -> Result<(), RelationshipError> {
    if is_valid_identifier(value) {
        Ok(())
    } else {
        Err(RelationshipError::InvalidIdentifier(value.to_string()))
    }
}

fn table_columns(conn: &Connection, table: &str) -> StoreResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = BTreeSet::new();
    while let Some(row) = rows.next()? {
        columns.insert(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
