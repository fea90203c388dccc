//! Per-expense serialization of approval state changes.

use std::sync::Arc;

use dashmap::DashMap;
use outlay_shared::types::ExpenseId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async locks, one per expense.
///
/// Every read-modify-write of an expense's requests and status runs while
/// holding that expense's guard. Different expenses never contend. An entry
/// lives only while some task holds or waits for it.
#[derive(Debug, Default)]
pub struct ExpenseLocks {
    locks: DashMap<ExpenseId, Arc<Mutex<()>>>,
}

/// Exclusive access to one expense, released on drop.
#[derive(Debug)]
pub struct ExpenseGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    expense_id: ExpenseId,
    locks: &'a DashMap<ExpenseId, Arc<Mutex<()>>>,
}

impl Drop for ExpenseGuard<'_> {
    fn drop(&mut self) {
        // Unlock first so the map holds the last reference when idle.
        drop(self.guard.take());
        // The shard lock orders this against `acquire` cloning the entry.
        self.locks
            .remove_if(&self.expense_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl ExpenseLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to an expense.
    ///
    /// The guard can be held across `.await` points. Dropping it unlocks
    /// the expense and removes the entry once nobody else wants it.
    pub async fn acquire(&self, expense_id: ExpenseId) -> ExpenseGuard<'_> {
        // Clone out of the map before awaiting so no shard lock is held.
        let lock = self.locks.entry(expense_id).or_default().clone();
        ExpenseGuard {
            guard: Some(lock.lock_owned().await),
            expense_id,
            locks: &self.locks,
        }
    }

    /// Number of expenses with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no lock entries exist.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
