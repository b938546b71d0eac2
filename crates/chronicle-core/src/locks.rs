//! Per-simulation mutual exclusion.
//!
//! Every coordinator step and every runtime mutation holds the lock for its
//! simulation id for its full duration. Locks are created on first use and
//! kept for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chronicle_types::SimulationId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A held per-simulation lock. Dropping it releases the lock.
pub type SimulationGuard = OwnedMutexGuard<()>;

/// Lazily populated map of simulation id to async mutex.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<SimulationId, Arc<AsyncMutex<()>>>>,
}

impl LockTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: &SimulationId) -> SimulationGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of simulation ids that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no lock has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_id_is_exclusive() {
        let table = Arc::new(LockTable::new());
        let id = SimulationId::from("sim-a");
        let guard = table.acquire(&id).await;

        let contender = {
            let table = Arc::clone(&table);
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = table.acquire(&id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        assert!(contender.await.is_ok());
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn different_ids_do_not_block() {
        let table = LockTable::new();
        let _a = table.acquire(&SimulationId::from("sim-a")).await;
        let _b = table.acquire(&SimulationId::from("sim-b")).await;
        assert_eq!(table.len(), 2);
    }
}
