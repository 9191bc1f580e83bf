//! Named per-key write locks with a bounded wait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dossier_core::{Error, Result};
use tokio::sync::OwnedMutexGuard;

/// One async mutex per `topic/subtopic` key, created on first use.
///
/// Writers to disjoint keys never contend. Same-key writers queue on the key
/// mutex for at most `wait`, then fail with `ConcurrencyConflict`.
#[derive(Debug)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    wait: Duration,
}

impl KeyLocks {
    pub fn new(wait: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            wait,
        }
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    pub async fn acquire(&self, key: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = self.lock_for(key);
        tokio::time::timeout(self.wait, lock.lock_owned())
            .await
            .map_err(|_| Error::ConcurrencyConflict {
                key: key.to_string(),
                waited_ms: self.wait.as_millis() as u64,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn same_key_waits_then_conflicts() {
        let locks = KeyLocks::new(Duration::from_millis(100));
        let _held = locks.acquire("valuation/dcf").await.unwrap();
        let err = locks.acquire("valuation/dcf").await.unwrap_err();
        assert!(matches!(err, Error::ConcurrencyConflict { waited_ms: 100, .. }));
    }

    #[tokio::test]
    async fn disjoint_keys_do_not_contend() {
        let locks = KeyLocks::new(Duration::from_millis(50));
        let _a = locks.acquire("valuation/dcf").await.unwrap();
        assert!(locks.acquire("strategic/moat").await.is_ok());
    }

    #[tokio::test]
    async fn released_lock_can_be_retaken() {
        let locks = KeyLocks::new(Duration::from_millis(50));
        drop(locks.acquire("k").await.unwrap());
        assert!(locks.acquire("k").await.is_ok());
    }
}
