//! Exclusive named locks, one per teacher or per class, held for the duration
//! of one generation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::trace;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{Instant, timeout_at};

/// A table of lazily created locks keyed by id. Entries nobody holds or waits
/// on are dropped the next time the table is touched.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Guards for a set of keys. Dropping it releases every lock.
#[derive(Debug)]
pub struct LockSet {
    keys: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet {
    /// The locked keys, in the order they were taken.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // Only the table itself references an idle entry.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Number of keys currently tracked.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Waits as long as it takes to lock a single key.
    pub async fn lock(&self, key: &str) -> LockSet {
        let guard = self.lock_for(key).await.lock_owned().await;
        trace!("Locked {}", key);
        LockSet {
            keys: vec![key.to_string()],
            _guards: vec![guard],
        }
    }

    /// Locks every key in ascending order, so two requests sharing keys can
    /// never wait on each other in a cycle. Gives up once `wait` has elapsed
    /// and returns the key it was waiting on; guards taken so far are released.
    pub async fn acquire(&self, keys: &[String], wait: Duration) -> Result<LockSet, String> {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let deadline = Instant::now() + wait;
        let mut guards = Vec::with_capacity(ordered.len());
        for key in &ordered {
            let lock = self.lock_for(key).await;
            match timeout_at(deadline, lock.lock_owned()).await {
                Ok(guard) => {
                    trace!("Locked {}", key);
                    guards.push(guard);
                }
                Err(_) => return Err(key.clone()),
            }
        }
        Ok(LockSet {
            keys: ordered,
            _guards: guards,
        })
    }
}
