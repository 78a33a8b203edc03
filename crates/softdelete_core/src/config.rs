//! Store behavior configuration.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - Unknown keys are rejected so typos do not silently change behavior.

use crate::schema::registry::is_valid_identifier;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid soft-delete config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("excluded relation must look like `table.column`, got `{0}`")]
    InvalidRelation(String),
}

/// Behavior switches for `SoftDeleteStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoftDeleteConfig {
    /// Fail a soft delete when a cascade edge reaches a type without
    /// soft-delete columns, instead of leaving it to hard delete.
    pub strict: bool,
    /// Emit delete notifications even when a soft delete hits an
    /// already-deleted record.
    pub signal_on_noop: bool,
    /// SQLite busy timeout applied to the store connection.
    pub busy_timeout_ms: u64,
    /// `table.column` relations skipped by soft-delete cascade.
    pub excluded_relations: Vec<String>,
}

impl Default for SoftDeleteConfig {
    fn default() -> Self {
        Self {
            strict: false,
            signal_on_noop: false,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            excluded_relations: Vec::new(),
        }
    }
}

impl SoftDeleteConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(value: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for relation in &self.excluded_relations {
            let valid = relation
                .trim()
                .split_once('.')
                .is_some_and(|(table, column)| {
                    is_valid_identifier(table) && is_valid_identifier(column)
                });
            if !valid {
                return Err(ConfigError::InvalidRelation(relation.clone()));
            }
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
