//! Static relationship descriptors.
//!
//! Each record type declares its table and the foreign keys it holds towards
//! parent types. The registry reverses these into parent -> dependent edges.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Behavior applied to dependents when their parent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    /// Dependents are deleted with the parent (soft or hard).
    Cascade,
    /// Hard delete is rejected while an alive dependent exists.
    Protect,
    /// Like `Protect`, unless the dependent is removed by the same delete
    /// through another cascade path.
    Restrict,
    /// Dependents' foreign key is cleared on hard delete.
    SetNull,
    /// Dependents' foreign key is reset to the column default on hard delete.
    SetDefault,
    /// No action; the database's own constraint decides.
    DoNothing,
}

impl OnDelete {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::Protect => "protect",
            Self::Restrict => "restrict",
            Self::SetNull => "set_null",
            Self::SetDefault => "set_default",
            Self::DoNothing => "do_nothing",
        }
    }
}

impl Display for OnDelete {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Foreign key declared on a dependent type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    /// Column on the dependent table holding the parent id.
    pub column: &'static str,
    /// Parent table name.
    pub references: &'static str,
    pub on_delete: OnDelete,
}

impl ForeignKey {
    pub const fn new(column: &'static str, references: &'static str, on_delete: OnDelete) -> Self {
        Self {
            column,
            references,
            on_delete,
        }
    }
}

/// Static declaration of one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub table: &'static str,
    /// Whether the table carries soft-delete columns.
    pub soft_delete: bool,
    pub foreign_keys: &'static [ForeignKey],
}

impl ModelDescriptor {
    /// Declares a type participating in soft-delete semantics.
    pub const fn soft_deletable(table: &'static str, foreign_keys: &'static [ForeignKey]) -> Self {
        Self {
            table,
            soft_delete: true,
            foreign_keys,
        }
    }

    /// Declares a type without soft-delete columns. Its rows are only ever
    /// physically deleted.
    pub const fn plain(table: &'static str, foreign_keys: &'static [ForeignKey]) -> Self {
        Self {
            table,
            soft_delete: false,
            foreign_keys,
        }
    }
}

/// Reversed foreign key: parent -> dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub parent: &'static str,
    pub dependent: &'static str,
    /// Column on `dependent` referencing `parent.id`.
    pub column: &'static str,
    pub on_delete: OnDelete,
    /// Whether `dependent` participates in soft delete.
    pub dependent_soft_delete: bool,
}

impl Edge {
    /// `dependent.column`, the key used to exclude a relation from cascade.
    pub fn relation_key(&self) -> String {
        format!("{}.{}", self.dependent, self.column)
    }
}
