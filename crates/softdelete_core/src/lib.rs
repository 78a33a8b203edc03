//! Visibility-partitioned soft delete for SQLite-backed records.
//!
//! Records carry an `is_deleted` flag and a `deleted_at` timestamp. The store
//! exposes alive, deleted and unfiltered views, cascades soft delete over
//! declared relationships, and keeps hard delete on the native pipeline.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod signals;

pub use config::{ConfigError, SoftDeleteConfig};
pub use error::{StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::record::{RecordId, SoftDeletable};
pub use model::state::{DeletionBatchId, SoftDeleteState, StateValidationError};
pub use repo::store::SoftDeleteStore;
pub use repo::view::{View, Visibility};
pub use schema::descriptor::{ForeignKey, ModelDescriptor, OnDelete};
pub use schema::registry::{ModelRegistry, RelationshipError};
pub use signals::{DeleteKind, ListenerId, Signal, SignalBus, SignalEvent};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
