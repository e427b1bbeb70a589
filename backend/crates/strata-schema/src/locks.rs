//! Per-class advisory locks
//!
//! Held by the handler from the moment it reads the snapshot it plans against
//! until the resulting record has been applied locally, so two local callers
//! never plan against the same stale snapshot of a class. Proposals from
//! other nodes are not covered: those conflicts are resolved at apply time.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Lock table keyed by lower-cased class name, so `Dup` and `dup` serialize.
///
/// An entry lives only while some caller holds or waits on it.
#[derive(Debug, Default)]
pub struct ClassLocks {
    locks: Arc<LockTable>,
}

impl ClassLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, class: &str) -> ClassGuard {
        let key = class.to_ascii_lowercase();
        // Clone the Arc out so the DashMap shard lock is not held across await
        let lock = self.locks.entry(key.clone()).or_default().clone();
        ClassGuard {
            guard: Some(lock.lock_owned().await),
            key,
            locks: self.locks.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Guard released on drop, including early returns on error
#[derive(Debug)]
pub struct ClassGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<LockTable>,
}

impl Drop for ClassGuard {
    fn drop(&mut self) {
        self.guard.take();
        // The table's own Arc is the last reference once nobody waits
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_class_is_serialized() {
        let locks = Arc::new(ClassLocks::new());
        let guard = locks.lock("Dup").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("dup").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        // the waiting task still references the entry
        assert_eq!(locks.len(), 1);

        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_classes_do_not_block() {
        let locks = ClassLocks::new();
        let _a = locks.lock("Article").await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.lock("Widget"))
            .await
            .unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_names_are_forgotten() {
        let locks = ClassLocks::new();
        for i in 0..100 {
            let _guard = locks.lock(&format!("Class{}", i)).await;
        }
        assert!(locks.is_empty());

        // a fresh entry after removal still excludes
        let guard = locks.lock("Article").await;
        assert!(
            tokio::time::timeout(Duration::from_millis(20), locks.lock("article"))
                .await
                .is_err()
        );
        drop(guard);
        assert!(locks.is_empty());
    }
}
