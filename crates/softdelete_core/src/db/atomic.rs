//! Atomic write scope shared by every cascading operation.
//!
//! # Invariants
//! - On the outermost call an `IMMEDIATE` transaction is opened and committed
//!   only when the closure succeeds.
//! - When the caller already holds a transaction, a uniquely named savepoint
//!   is used instead, so a failure rolls back only this scope's writes.

use log::warn;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::atomic::{AtomicU64, Ordering};

static SAVEPOINT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Runs `f` inside a transaction (or nested savepoint) on `conn`.
///
/// Any error returned by `f` rolls back every write `f` made.
pub fn atomic<T, E, F>(conn: &Connection, f: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    if conn.is_autocommit() {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        // Dropping `tx` on the error path rolls back.
        let value = f(&*tx)?;
        tx.commit()?;
        return Ok(value);
    }

    let name = format!(
        "softdelete_sp_{}",
        SAVEPOINT_SEQ.fetch_add(1, Ordering::Relaxed)
    );
    conn.execute_batch(&format!("SAVEPOINT {name};"))?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE SAVEPOINT {name};"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};"
            )) {
                warn!(
                    "event=savepoint_rollback module=db status=error savepoint={name} error={rollback_err}"
                );
            }
            Err(err)
        }
    }
}
