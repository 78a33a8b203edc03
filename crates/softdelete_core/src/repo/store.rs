//! Soft-delete store over one SQLite connection.
//!
//! # Responsibility
//! - Own the record registry, behavior config and signal bus.
//! - Run soft delete, restore and hard delete inside one transaction scope
//!   per call.
//!
//! # Invariants
//! - Soft delete cascades over `Cascade` edges only; restore never cascades.
//! - Bulk operations process records one by one so every record gets its own
//!   notifications and timestamps.
//! - A failing call leaves no partial writes behind.

use crate::config::SoftDeleteConfig;
use crate::db::atomic;
use crate::error::{StoreError, StoreResult};
use crate::model::record::{RecordId, SoftDeletable};
use crate::model::state::now_epoch_ms;
use crate::repo::cascade::SoftDeleteCascade;
use crate::repo::collector::HardDeleteCollector;
use crate::repo::sql::{load_state, record_exists, write_state};
use crate::repo::view::{View, Visibility};
use crate::schema::registry::ModelRegistry;
use crate::signals::{Signal, SignalBus, SignalEvent};
use log::{debug, error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Entry point for visibility-partitioned record access.
#[derive(Debug)]
pub struct SoftDeleteStore<'conn> {
    conn: &'conn Connection,
    registry: ModelRegistry,
    config: SoftDeleteConfig,
    signals: SignalBus,
}

impl<'conn> SoftDeleteStore<'conn> {
    /// Builds a store after checking config, registry and live schema.
    ///
    /// # Errors
    /// - `Config` when an excluded relation is malformed.
    /// - `RelationshipIntrospection` when a foreign key or excluded relation
    ///   does not resolve, or a declared table/column is missing.
    pub fn try_new(
        conn: &'conn Connection,
        mut registry: ModelRegistry,
        config: SoftDeleteConfig,
    ) -> StoreResult<Self> {
        config.validate()?;
        registry.validate()?;
        for relation in &config.excluded_relations {
            registry.exclude_relation(relation)?;
        }
        registry.validate_against(conn)?;
        conn.busy_timeout(config.busy_timeout())?;

        info!(
            "event=store_init module=repo status=ok models={} strict={} excluded_relations={}",
            registry.len(),
            config.strict,
            config.excluded_relations.len()
        );

        Ok(Self {
            conn,
            registry,
            config,
            signals: SignalBus::new(),
        })
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SoftDeleteConfig {
        &self.config
    }

    /// Listener registry for lifecycle notifications.
    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    /// Records with `is_deleted = false`.
    pub fn alive<M: SoftDeletable>(&self) -> View<'_, M> {
        View::new(self, Visibility::Alive)
    }

    /// Records with `is_deleted = true`.
    pub fn deleted<M: SoftDeletable>(&self) -> View<'_, M> {
        View::new(self, Visibility::Deleted)
    }

    /// Every record regardless of the flag.
    pub fn all_records<M: SoftDeletable>(&self) -> View<'_, M> {
        View::new(self, Visibility::All)
    }

    pub fn view<M: SoftDeletable>(&self, visibility: Visibility) -> View<'_, M> {
        View::new(self, visibility)
    }

    /// Soft-deletes `record` and its cascade dependents, then refreshes the
    /// record's in-memory state.
    ///
    /// Returns the number of records flipped to deleted; `0` when the record
    /// was already deleted.
    pub fn soft_delete<M: SoftDeletable>(&self, record: &mut M) -> StoreResult<usize> {
        let affected = self.soft_delete_by_id::<M>(record.id())?;
        self.refresh(record)?;
        Ok(affected)
    }

    pub fn soft_delete_by_id<M: SoftDeletable>(&self, id: RecordId) -> StoreResult<usize> {
        let table = self.registry.require_soft_deletable(M::MODEL.table)?.table;
        let started = Instant::now();
        let result: StoreResult<usize> = atomic(self.conn, |conn| {
            let mut cascade =
                SoftDeleteCascade::new(conn, &self.registry, &self.config, &self.signals);
            cascade.run(table, id)?;
            debug!(
                "event=soft_delete_batch module=repo table={table} id={id} batch={}",
                cascade.batch()
            );
            Ok(cascade.affected())
        });
        log_outcome("soft_delete", table, result.as_ref().copied(), started);
        result
    }

    /// Soft-deletes every record in `view`, one by one, sharing one batch.
    pub fn soft_delete_bulk<M: SoftDeletable>(&self, view: &View<'_, M>) -> StoreResult<usize> {
        let table = self.registry.require_soft_deletable(M::MODEL.table)?.table;
        let started = Instant::now();
        let result: StoreResult<usize> = atomic(self.conn, |conn| {
            let ids = view.ids()?;
            let mut cascade =
                SoftDeleteCascade::new(conn, &self.registry, &self.config, &self.signals);
            for id in ids {
                cascade.run(table, id)?;
            }
            Ok(cascade.affected())
        });
        log_outcome("soft_delete_bulk", table, result.as_ref().copied(), started);
        result
    }

    /// Restores `record` only. Returns `false` when it was already alive.
    pub fn restore<M: SoftDeletable>(&self, record: &mut M) -> StoreResult<bool> {
        let restored = self.restore_by_id::<M>(record.id())?;
        self.refresh(record)?;
        Ok(restored)
    }

    pub fn restore_by_id<M: SoftDeletable>(&self, id: RecordId) -> StoreResult<bool> {
        let table = self.registry.require_soft_deletable(M::MODEL.table)?.table;
        let started = Instant::now();
        let result: StoreResult<bool> = atomic(self.conn, |conn| self.restore_one(conn, table, id));
        log_outcome(
            "restore",
            table,
            result.as_ref().map(|restored| usize::from(*restored)),
            started,
        );
        result
    }

    /// Restores every deleted record in `view`, one by one.
    ///
    /// Returns the number of records flipped back to alive.
    pub fn restore_bulk<M: SoftDeletable>(&self, view: &View<'_, M>) -> StoreResult<usize> {
        let table = self.registry.require_soft_deletable(M::MODEL.table)?.table;
        let started = Instant::now();
        let result: StoreResult<usize> = atomic(self.conn, |conn| {
            let mut restored = 0;
            for id in view.ids()? {
                if self.restore_one(conn, table, id)? {
                    restored += 1;
                }
            }
            Ok(restored)
        });
        log_outcome("restore_bulk", table, result.as_ref().copied(), started);
        result
    }

    /// Physically removes `record` through the native deletion pipeline.
    ///
    /// Returns the number of rows removed, dependents included.
    pub fn hard_delete<M: SoftDeletable>(&self, record: M) -> StoreResult<usize> {
        self.hard_delete_by_id::<M>(record.id())
    }

    pub fn hard_delete_by_id<M: SoftDeletable>(&self, id: RecordId) -> StoreResult<usize> {
        let table = self.registry.require(M::MODEL.table)?.table;
        let started = Instant::now();
        let result: StoreResult<usize> = atomic(self.conn, |conn| {
            if !record_exists(conn, table, id)? {
                return Err(StoreError::NotFound { table, id });
            }
            let mut collector = HardDeleteCollector::new(conn, &self.registry, &self.signals);
            collector.collect(table, id)?;
            collector.delete()
        });
        log_outcome("hard_delete", table, result.as_ref().copied(), started);
        result
    }

    /// Hard-deletes every record in `view` with one collection pass.
    pub fn hard_delete_bulk<M: SoftDeletable>(&self, view: &View<'_, M>) -> StoreResult<usize> {
        let table = self.registry.require(M::MODEL.table)?.table;
        let started = Instant::now();
        let result: StoreResult<usize> = atomic(self.conn, |conn| {
            let mut collector = HardDeleteCollector::new(conn, &self.registry, &self.signals);
            for id in view.ids()? {
                collector.collect(table, id)?;
            }
            collector.delete()
        });
        log_outcome("hard_delete_bulk", table, result.as_ref().copied(), started);
        result
    }

    fn restore_one(
        &self,
        conn: &Connection,
        table: &'static str,
        id: RecordId,
    ) -> StoreResult<bool> {
        let mut state =
            load_state(conn, table, id)?.ok_or(StoreError::NotFound { table, id })?;
        if !state.is_deleted {
            return Ok(false);
        }

        let batch = state.deletion_batch;
        state.mark_restored(now_epoch_ms());
        write_state(conn, table, id, &state)?;
        self.signals.send(&SignalEvent {
            signal: Signal::PostRestore,
            kind: None,
            table,
            record_id: id,
            deletion_batch: batch,
        });
        Ok(true)
    }

    fn refresh<M: SoftDeletable>(&self, record: &mut M) -> StoreResult<()> {
        let table = M::MODEL.table;
        let id = record.id();
        let state = load_state(self.conn, table, id)?.ok_or(StoreError::NotFound { table, id })?;
        *record.state_mut() = state;
        Ok(())
    }
}

fn log_outcome(event: &str, table: &str, outcome: Result<usize, &StoreError>, started: Instant) {
    let duration_ms = started.elapsed().as_millis();
    match outcome {
        Ok(affected) => info!(
            "event={event} module=repo status=ok table={table} affected={affected} duration_ms={duration_ms}"
        ),
        Err(err) => error!(
            "event={event} module=repo status=error table={table} duration_ms={duration_ms} error={err}"
        ),
    }
}
