//! Record-level soft-delete model.
//!
//! # Responsibility
//! - Define the persisted tombstone state shared by all participating types.
//! - Define the capability trait record types implement to opt in.
//!
//! # Invariants
//! - Every record is identified by a stable integer `RecordId`.
//! - Soft deletion is a tombstone; only `hard_delete` removes rows.

pub mod record;
pub mod state;
