//! In-process notification dispatch for deletion lifecycle events.
//!
//! # Responsibility
//! - Let callers observe per-record delete/restore events.
//! - Mirror native single-record delete notifications for soft delete.
//!
//! # Invariants
//! - Events are sent once per affected record, never batched.
//! - Listeners run synchronously on the calling thread, inside the
//!   operation's transaction scope.
//! - Listeners may connect/disconnect from inside a callback; the change
//!   takes effect on the next event.

use crate::model::record::RecordId;
use crate::model::state::DeletionBatchId;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Lifecycle notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Sent before a record is soft- or hard-deleted.
    PreDelete,
    /// Sent after a record is soft- or hard-deleted.
    PostDelete,
    PostSoftDelete,
    PostHardDelete,
    PostRestore,
}

/// Distinguishes soft from hard deletes on `PreDelete`/`PostDelete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteKind {
    Soft,
    Hard,
}

/// One notification for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalEvent {
    pub signal: Signal,
    /// Set for `PreDelete`/`PostDelete`.
    pub kind: Option<DeleteKind>,
    /// Sender: the record's table.
    pub table: &'static str,
    pub record_id: RecordId,
    /// Soft-delete batch, when the event belongs to one.
    pub deletion_batch: Option<DeletionBatchId>,
}

pub type ListenerId = u64;

type Listener = Arc<dyn Fn(&SignalEvent) + Send + Sync>;

struct Registration {
    id: ListenerId,
    signal: Signal,
    sender: Option<String>,
    listener: Listener,
}

/// Listener registry and dispatcher.
#[derive(Default)]
pub struct SignalBus {
    registrations: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl Debug for SignalBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects `listener` to `signal`.
    ///
    /// With `sender = Some(table)` only events for that table are delivered.
    pub fn connect<F>(&self, signal: Signal, sender: Option<&str>, listener: F) -> ListenerId
    where
        F: Fn(&SignalEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registrations.push(Registration {
            id,
            signal,
            sender: sender.map(str::to_string),
            listener: Arc::new(listener),
        });
        id
    }

    /// Disconnects one listener. Returns `false` when `id` is unknown.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        registrations.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Delivers `event` to matching listeners in connection order.
    ///
    /// Returns the number of listeners invoked.
    pub fn send(&self, event: &SignalEvent) -> usize {
        let matching: Vec<Listener> = {
            let registrations = self
                .registrations
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            registrations
                .iter()
                .filter(|registration| registration.signal == event.signal)
                .filter(|registration| {
                    registration
                        .sender
                        .as_deref()
                        .map_or(true, |sender| sender == event.table)
                })
                .map(|registration| Arc::clone(&registration.listener))
                .collect()
        };

        for listener in &matching {
            listener(event);
        }
        matching.len()
    }
}
