//! Soft-delete repository layer.
//!
//! # Responsibility
//! - Expose visibility-partitioned views and lifecycle operations.
//! - Keep traversal and row-level SQL behind the store boundary.
//!
//! # Invariants
//! - Every public write runs inside `db::atomic`.
//! - Cascade and collector never open transactions of their own.

mod cascade;
mod collector;
mod sql;
pub mod store;
pub mod view;
