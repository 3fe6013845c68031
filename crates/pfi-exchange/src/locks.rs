//! Per-exchange mutual exclusion.
//!
//! Messages for one exchange are processed strictly one at a time, across
//! every suspension point (signing, catalog, store). Different exchanges
//! never contend.

use std::sync::Arc;

use dashmap::DashMap;
use pfi_types::ExchangeId;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<ExchangeId, Arc<Mutex<()>>>;

/// Lazily created async mutex per exchange id. An entry lives only while
/// someone holds or waits on it.
#[derive(Debug, Default)]
pub struct ExchangeLocks {
    locks: Arc<LockTable>,
}

impl ExchangeLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `exchange_id`.
    pub async fn lock(&self, exchange_id: ExchangeId) -> ExchangeGuard {
        // The shard guard must be gone before awaiting.
        let mutex = Arc::clone(self.locks.entry(exchange_id).or_default().value());
        ExchangeGuard {
            locks: Arc::clone(&self.locks),
            exchange_id,
            guard: Some(mutex.lock_owned().await),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one exchange. Dropping it removes the table entry
/// when no other task is waiting.
#[derive(Debug)]
pub struct ExchangeGuard {
    locks: Arc<LockTable>,
    exchange_id: ExchangeId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.exchange_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
