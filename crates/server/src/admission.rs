//! Per-fingerprint admission locks for duplicate submissions.
//!
//! Two requests carrying the same plugin and canonicalized parameters
//! race for one lock; the winner creates the computation and the loser
//! observes it afterwards and coalesces onto the same correlation id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Identity of a submission for deduplication purposes.
pub type DedupKey = (String, String);

/// Keyed async locks, one per (plugin id, fingerprint) pair.
///
/// Entries are held weakly; a key's lock is freed as soon as no request
/// holds or awaits it, so the map does not grow with submission history.
#[derive(Default)]
pub struct AdmissionLocks {
    locks: Mutex<HashMap<DedupKey, Weak<AsyncMutex<()>>>>,
}

impl AdmissionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the admission lock for a submission identity.
    pub async fn acquire(&self, plugin_id: &str, fingerprint: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("admission map poisoned");
            // Drop entries whose lock nobody holds anymore.
            locks.retain(|_, weak| weak.strong_count() > 0);

            let key = (plugin_id.to_string(), fingerprint.to_string());
            match locks.get(&key).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let fresh = Arc::new(AsyncMutex::new(()));
                    locks.insert(key, Arc::downgrade(&fresh));
                    fresh
                }
            }
        };
        lock.lock_owned().await
    }

    /// Number of live lock entries, for tests.
    pub fn live_locks(&self) -> usize {
        let locks = self.locks.lock().expect("admission map poisoned");
        locks
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(AdmissionLocks::new());
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let in_section = Arc::clone(&in_section);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("echo", "fp").await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let locks = AdmissionLocks::new();
        let _a = locks.acquire("echo", "fp-a").await;
        // Must not deadlock: distinct key gets its own lock.
        let _b = locks.acquire("echo", "fp-b").await;
        let _c = locks.acquire("other", "fp-a").await;
    }

    #[tokio::test]
    async fn released_locks_are_collected() {
        let locks = AdmissionLocks::new();
        {
            let _guard = locks.acquire("echo", "fp").await;
            assert_eq!(locks.live_locks(), 1);
        }
        // A later acquire on any key sweeps the dead entry.
        let _other = locks.acquire("echo", "fp2").await;
        assert_eq!(locks.live_locks(), 1);
    }
}
