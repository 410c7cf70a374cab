//! Scoped transaction guard for repository write operations.
//!
//! # Responsibility
//! - Begin (or adopt) one SQLite transaction and resolve it exactly once.
//!
//! # Invariants
//! - The default outcome is rollback; a commit happens only after
//!   `mark_commit()`.
//! - Scope exit (explicit `finish()` or drop) resolves the transaction
//!   exactly once, success or panic alike.

use crate::repo::{StoreError, StoreResult};
use rusqlite::{Connection, DropBehavior, Transaction, TransactionBehavior};
use std::ops::Deref;

/// A transaction that rolls back unless explicitly marked for commit.
///
/// Statements prepared through the guard (it derefs to [`Connection`]) run
/// inside the wrapped transaction.
pub struct TxnGuard<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> TxnGuard<'conn> {
    /// Begins an IMMEDIATE transaction on the connection.
    ///
    /// Write operations take the reserved lock up front so a later upgrade
    /// cannot deadlock against another writer.
    pub fn begin(conn: &'conn mut Connection) -> StoreResult<Self> {
        Self::begin_with_behavior(conn, TransactionBehavior::Immediate)
    }

    /// Begins a transaction with an explicit locking behavior.
    pub fn begin_with_behavior(
        conn: &'conn mut Connection,
        behavior: TransactionBehavior,
    ) -> StoreResult<Self> {
        let mut tx = conn
            .transaction_with_behavior(behavior)
            .map_err(StoreError::from)?;
        tx.set_drop_behavior(DropBehavior::Rollback);
        Ok(Self { tx })
    }

    /// Wraps an already-begun transaction, taking over its resolution.
    pub fn adopt(mut tx: Transaction<'conn>) -> Self {
        tx.set_drop_behavior(DropBehavior::Rollback);
        Self { tx }
    }

    /// Marks the guard to commit on scope exit.
    pub fn mark_commit(&mut self) {
        self.tx.set_drop_behavior(DropBehavior::Commit);
    }

    /// Marks the guard to roll back on scope exit (the default).
    pub fn mark_rollback(&mut self) {
        self.tx.set_drop_behavior(DropBehavior::Rollback);
    }

    /// Resolves the transaction now, surfacing commit/rollback errors that
    /// a plain drop would swallow.
    pub fn finish(self) -> StoreResult<()> {
        self.tx.finish().map_err(StoreError::from)
    }
}

impl Deref for TxnGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}
