//! Row-lock table for the in-memory store.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use custodia_core::{DomainError, ResourceId};

use crate::error::StoreError;

/// Exclusive per-resource locks with bounded waits.
#[derive(Debug, Default)]
pub(crate) struct RowLocks {
    held: Mutex<HashSet<ResourceId>>,
    released: Condvar,
}

/// Releases its row when dropped.
#[derive(Debug)]
pub(crate) struct RowGuard<'a> {
    locks: &'a RowLocks,
    id: ResourceId,
}

impl RowLocks {
    /// Wait up to `timeout` for the row; contention past that is a `Conflict`.
    pub(crate) fn acquire(&self, id: ResourceId, timeout: Duration) -> Result<RowGuard<'_>, StoreError> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock().map_err(|_| StoreError::poisoned())?;
        while held.contains(&id) {
            let now = Instant::now();
            if now >= deadline {
                return Err(DomainError::conflict(format!(
                    "resource {id} is locked by another operation, retry"
                ))
                .into());
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| StoreError::poisoned())?;
            held = guard;
        }
        held.insert(id);
        Ok(RowGuard { locks: self, id })
    }
}

impl Drop for RowGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.locks.held.lock() {
            held.remove(&self.id);
        }
        self.locks.released.notify_all();
    }
}
