//! Soft-delete cascade traversal.
//!
//! # Invariants
//! - A record is flagged before its dependents are visited, so relationship
//!   cycles terminate.
//! - Traversal runs on an explicit work stack; chain depth is bounded by
//!   memory, not by the thread stack.
//! - Only `Cascade` edges to participating types propagate; every other edge
//!   is left for hard delete to resolve.
//! - Every record flipped by one traversal shares the traversal's batch id
//!   and gets its own `deleted_at`.

use crate::config::SoftDeleteConfig;
use crate::error::{StoreError, StoreResult};
use crate::model::record::RecordId;
use crate::model::state::{now_epoch_ms, DeletionBatchId};
use crate::repo::sql::{dependent_ids, load_state, write_state, DependentFilter};
use crate::schema::descriptor::OnDelete;
use crate::schema::registry::{ModelRegistry, RelationshipError};
use crate::signals::{DeleteKind, Signal, SignalBus, SignalEvent};
use log::debug;
use rusqlite::Connection;
use uuid::Uuid;

/// Pending traversal work. `Finish` sends a record's post notifications once
/// its whole subtree is done.
enum Step {
    Visit(&'static str, RecordId),
    Finish(&'static str, RecordId),
}

pub(crate) struct SoftDeleteCascade<'a> {
    conn: &'a Connection,
    registry: &'a ModelRegistry,
    config: &'a SoftDeleteConfig,
    signals: &'a SignalBus,
    batch: DeletionBatchId,
    affected: usize,
}

impl<'a> SoftDeleteCascade<'a> {
    pub(crate) fn new(
        conn: &'a Connection,
        registry: &'a ModelRegistry,
        config: &'a SoftDeleteConfig,
        signals: &'a SignalBus,
    ) -> Self {
        Self {
            conn,
            registry,
            config,
            signals,
            batch: Uuid::new_v4(),
            affected: 0,
        }
    }

    pub(crate) fn batch(&self) -> DeletionBatchId {
        self.batch
    }

    /// Number of records flipped to deleted so far.
    pub(crate) fn affected(&self) -> usize {
        self.affected
    }

    /// Soft-deletes one root record and its cascade dependents.
    ///
    /// An already-deleted root is a successful no-op.
    pub(crate) fn run(&mut self, table: &'static str, id: RecordId) -> StoreResult<()> {
        let state =
            load_state(self.conn, table, id)?.ok_or(StoreError::NotFound { table, id })?;

        if state.is_deleted {
            debug!("event=soft_delete_noop module=repo table={table} id={id}");
            if self.config.signal_on_noop {
                self.emit_pre(table, id, state.deletion_batch);
                self.emit_post(table, id, state.deletion_batch);
            }
            return Ok(());
        }

        let mut stack = vec![Step::Visit(table, id)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Visit(table, id) => {
                    // An earlier branch of this traversal may have reached it.
                    let Some(mut state) = load_state(self.conn, table, id)? else {
                        continue;
                    };
                    if state.is_deleted {
                        continue;
                    }

                    self.emit_pre(table, id, Some(self.batch));
                    state.mark_deleted(now_epoch_ms(), self.batch);
                    write_state(self.conn, table, id, &state)?;
                    self.affected += 1;

                    stack.push(Step::Finish(table, id));
                    let dependents = self.cascade_targets(table, id)?;
                    stack.extend(
                        dependents
                            .into_iter()
                            .rev()
                            .map(|(dependent, dependent_id)| Step::Visit(dependent, dependent_id)),
                    );
                }
                Step::Finish(table, id) => self.emit_post(table, id, Some(self.batch)),
            }
        }
        Ok(())
    }

    /// Alive dependents reached from `(table, id)` over cascade edges, in
    /// edge order.
    fn cascade_targets(
        &self,
        table: &'static str,
        id: RecordId,
    ) -> StoreResult<Vec<(&'static str, RecordId)>> {
        let mut targets = Vec::new();
        for edge in self.registry.dependents_of(table)? {
            if edge.on_delete != OnDelete::Cascade {
                continue;
            }
            if self.registry.is_excluded(&edge) {
                debug!(
                    "event=soft_delete_skip module=repo reason=excluded relation={}",
                    edge.relation_key()
                );
                continue;
            }
            if !edge.dependent_soft_delete {
                if self.config.strict {
                    return Err(RelationshipError::NonSoftDeletableDependent {
                        parent: edge.parent,
                        dependent: edge.dependent,
                        column: edge.column,
                    }
                    .into());
                }
                debug!(
                    "event=soft_delete_skip module=repo reason=not_soft_deletable relation={}",
                    edge.relation_key()
                );
                continue;
            }

            for dependent_id in dependent_ids(self.conn, &edge, id, DependentFilter::Alive)? {
                targets.push((edge.dependent, dependent_id));
            }
        }
        Ok(targets)
    }

    fn emit_pre(&self, table: &'static str, id: RecordId, batch: Option<DeletionBatchId>) {
        self.signals.send(&SignalEvent {
            signal: Signal::PreDelete,
            kind: Some(DeleteKind::Soft),
            table,
            record_id: id,
            deletion_batch: batch,
        });
    }

    fn emit_post(&self, table: &'static str, id: RecordId, batch: Option<DeletionBatchId>) {
        self.signals.send(&SignalEvent {
            signal: Signal::PostDelete,
            kind: Some(DeleteKind::Soft),
            table,
            record_id: id,
            deletion_batch: batch,
        });
        self.signals.send(&SignalEvent {
            signal: Signal::PostSoftDelete,
            kind: None,
            table,
            record_id: id,
            deletion_batch: batch,
        });
    }
}
