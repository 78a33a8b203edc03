//! Native hard-delete pipeline.
//!
//! Collects a root record and everything its deletion reaches, resolves
//! protect/restrict/set-null edges, then physically removes the rows.
//!
//! # Invariants
//! - Nothing is written until collection and restrict checks succeed.
//! - Tombstoned dependents never block a delete; they are removed with the
//!   parent on protect/restrict edges.
//! - Collection runs on an explicit work stack, never on Rust recursion.
//! - Foreign key checks are deferred while rows are removed so removal order
//!   does not matter. The caller's `defer_foreign_keys` setting is restored
//!   afterwards, and do-nothing dependents left dangling fail the call itself
//!   instead of a later commit.

use crate::error::{StoreError, StoreResult};
use crate::model::record::RecordId;
use crate::repo::sql::{
    clear_reference, delete_row, dependent_ids, foreign_key_violations, reset_reference,
    DependentFilter,
};
use crate::schema::descriptor::{Edge, OnDelete};
use crate::schema::registry::ModelRegistry;
use crate::signals::{DeleteKind, Signal, SignalBus, SignalEvent};
use log::warn;
use rusqlite::{ffi, Connection};
use std::collections::HashSet;

enum Step {
    Collect(&'static str, RecordId),
    Finish(&'static str, RecordId),
}

struct RestrictedReference {
    table: &'static str,
    id: RecordId,
    edge: Edge,
    alive_ids: Vec<RecordId>,
}

pub(crate) struct HardDeleteCollector<'a> {
    conn: &'a Connection,
    registry: &'a ModelRegistry,
    signals: &'a SignalBus,
    seen: HashSet<(&'static str, RecordId)>,
    // Post-order: dependents precede their parent.
    order: Vec<(&'static str, RecordId)>,
    cleared: Vec<(Edge, RecordId)>,
    // Do-nothing edges left for SQLite's own constraint.
    unresolved: Vec<(Edge, RecordId)>,
    restricted: Vec<RestrictedReference>,
}

impl<'a> HardDeleteCollector<'a> {
    pub(crate) fn new(
        conn: &'a Connection,
        registry: &'a ModelRegistry,
        signals: &'a SignalBus,
    ) -> Self {
        Self {
            conn,
            registry,
            signals,
            seen: HashSet::new(),
            order: Vec::new(),
            cleared: Vec::new(),
            unresolved: Vec::new(),
            restricted: Vec::new(),
        }
    }

    pub(crate) fn collect(&mut self, table: &'static str, id: RecordId) -> StoreResult<()> {
        let mut stack = vec![Step::Collect(table, id)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Collect(table, id) => {
                    if !self.seen.insert((table, id)) {
                        continue;
                    }
                    stack.push(Step::Finish(table, id));
                    let reached = self.resolve_edges(table, id)?;
                    stack.extend(
                        reached
                            .into_iter()
                            .rev()
                            .map(|(dependent, dependent_id)| Step::Collect(dependent, dependent_id)),
                    );
                }
                Step::Finish(table, id) => self.order.push((table, id)),
            }
        }
        Ok(())
    }

    /// Applies every edge leaving `(table, id)` and returns the dependents the
    /// deletion reaches, in edge order.
    fn resolve_edges(
        &mut self,
        table: &'static str,
        id: RecordId,
    ) -> StoreResult<Vec<(&'static str, RecordId)>> {
        let mut reached = Vec::new();
        for edge in self.registry.dependents_of(table)? {
            let dependents = match edge.on_delete {
                OnDelete::Cascade => dependent_ids(self.conn, &edge, id, DependentFilter::Any)?,
                OnDelete::Protect => {
                    let alive_ids = dependent_ids(self.conn, &edge, id, DependentFilter::Alive)?;
                    if !alive_ids.is_empty() {
                        return Err(protected(table, id, &edge, alive_ids));
                    }
                    dependent_ids(self.conn, &edge, id, DependentFilter::Deleted)?
                }
                OnDelete::Restrict => {
                    let alive_ids = dependent_ids(self.conn, &edge, id, DependentFilter::Alive)?;
                    if !alive_ids.is_empty() {
                        self.restricted.push(RestrictedReference {
                            table,
                            id,
                            edge,
                            alive_ids,
                        });
                    }
                    dependent_ids(self.conn, &edge, id, DependentFilter::Deleted)?
                }
                OnDelete::SetNull | OnDelete::SetDefault => {
                    self.cleared.push((edge, id));
                    Vec::new()
                }
                OnDelete::DoNothing => {
                    self.unresolved.push((edge, id));
                    Vec::new()
                }
            };
            reached.extend(
                dependents
                    .into_iter()
                    .map(|dependent_id| (edge.dependent, dependent_id)),
            );
        }
        Ok(reached)
    }

    /// Removes every collected row. Returns the number of rows removed.
    pub(crate) fn delete(self) -> StoreResult<usize> {
        for reference in &self.restricted {
            let blocking: Vec<RecordId> = reference
                .alive_ids
                .iter()
                .copied()
                .filter(|dependent_id| {
                    !self
                        .seen
                        .contains(&(reference.edge.dependent, *dependent_id))
                })
                .collect();
            if !blocking.is_empty() {
                return Err(protected(
                    reference.table,
                    reference.id,
                    &reference.edge,
                    blocking,
                ));
            }
        }

        let deferred_before: bool =
            self.conn
                .query_row("PRAGMA defer_foreign_keys;", [], |row| row.get(0))?;
        self.conn.execute_batch("PRAGMA defer_foreign_keys = ON;")?;
        let removed = self.remove_rows();
        // The pragma outlives a savepoint, so hand the caller's value back.
        let reset = if deferred_before {
            Ok(())
        } else {
            self.conn.execute_batch("PRAGMA defer_foreign_keys = OFF;")
        };
        let removed = removed?;
        reset?;
        Ok(removed)
    }

    fn remove_rows(&self) -> StoreResult<usize> {
        for (edge, parent_id) in &self.cleared {
            match edge.on_delete {
                OnDelete::SetDefault => reset_reference(self.conn, edge, *parent_id)?,
                _ => clear_reference(self.conn, edge, *parent_id)?,
            };
        }

        for &(table, id) in &self.order {
            self.emit(Signal::PreDelete, Some(DeleteKind::Hard), table, id);
        }

        let mut removed = 0;
        for &(table, id) in &self.order {
            removed += delete_row(self.conn, table, id)?;
            self.emit(Signal::PostDelete, Some(DeleteKind::Hard), table, id);
            self.emit(Signal::PostHardDelete, None, table, id);
        }

        self.check_unresolved()?;
        Ok(removed)
    }

    /// Fails like a commit would when a do-nothing dependent still points at
    /// a removed row through a declared SQLite foreign key.
    fn check_unresolved(&self) -> StoreResult<()> {
        for (edge, parent_id) in &self.unresolved {
            let dangling = dependent_ids(self.conn, edge, *parent_id, DependentFilter::Any)?;
            if dangling.is_empty() {
                continue;
            }
            let violations = foreign_key_violations(self.conn, edge)?;
            if dangling.iter().any(|id| violations.contains(id)) {
                warn!(
                    "event=hard_delete_fk_violation module=repo table={} id={parent_id} relation={}",
                    edge.parent,
                    edge.relation_key()
                );
                return Err(rusqlite::Error::SqliteFailure(
                    ffi::Error::new(ffi::SQLITE_CONSTRAINT_FOREIGNKEY),
                    Some("FOREIGN KEY constraint failed".to_string()),
                )
                .into());
            }
        }
        Ok(())
    }

    fn emit(&self, signal: Signal, kind: Option<DeleteKind>, table: &'static str, id: RecordId) {
        self.signals.send(&SignalEvent {
            signal,
            kind,
            table,
            record_id: id,
            deletion_batch: None,
        });
    }
}

fn protected(
    table: &'static str,
    id: RecordId,
    edge: &Edge,
    dependent_ids: Vec<RecordId>,
) -> StoreError {
    StoreError::ProtectedReference {
        table,
        id,
        dependent: edge.dependent,
        column: edge.column,
        on_delete: edge.on_delete,
        dependent_ids,
    }
}
