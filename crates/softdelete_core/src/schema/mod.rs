//! Relationship metadata consulted by cascade and hard-delete traversal.
//!
//! # Responsibility
//! - Declare record tables and their foreign keys statically.
//! - Resolve dependents of a table without runtime reflection.

pub mod descriptor;
pub mod registry;
