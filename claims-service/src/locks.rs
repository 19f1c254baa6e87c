use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// Per-entity async locks.
///
/// Claim operations lock the claim; batch operations lock the batch and then
/// each member claim in ascending id order. An entity's mutex is dropped from
/// the table once nobody holds or waits on it.
pub struct LockTable {
    locks: Arc<LockMap>,
}

/// Held lock on one entity
pub struct EntityGuard {
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // waiters hold their own clone, so a count of one means only the table is left
        self.locks.remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn lock(&self, id: Uuid) -> EntityGuard {
        let mutex = self.locks.entry(id).or_default().value().clone();
        let guard = mutex.lock_owned().await;
        EntityGuard {
            id,
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    /// Lock several entities, deduplicated and in ascending id order
    pub async fn lock_all(&self, ids: impl IntoIterator<Item = Uuid>) -> Vec<EntityGuard> {
        let mut ids: Vec<Uuid> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }

    /// Entities with a live mutex
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_second_locker_waits() {
        let table = Arc::new(LockTable::new());
        let id = Uuid::new_v4();
        let guard = table.lock(id).await;

        let contender = {
            let table = table.clone();
            tokio::spawn(async move {
                let _guard = table.lock(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        // the waiter keeps the entry alive after the holder leaves
        drop(guard);
        contender.await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_released_entities_leave_the_table() {
        let table = LockTable::new();
        let ids: Vec<Uuid> = (0..50).map(|_| Uuid::new_v4()).collect();

        let guards = table.lock_all(ids.iter().copied()).await;
        assert_eq!(table.len(), 50);
        drop(guards);
        assert!(table.is_empty());

        for id in &ids {
            let _guard = table.lock(*id).await;
        }
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_still_excluded_after_cleanup_attempt() {
        let table = Arc::new(LockTable::new());
        let id = Uuid::new_v4();
        let first = table.lock(id).await;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut waiters = Vec::new();
        for n in 0..2 {
            let table = table.clone();
            let tx = tx.clone();
            waiters.push(tokio::spawn(async move {
                let _guard = table.lock(id).await;
                tx.send(("enter", n)).unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
                tx.send(("leave", n)).unwrap();
            }));
        }
        drop(tx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);
        for waiter in waiters {
            waiter.await.unwrap();
        }

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        // critical sections never overlap
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].0, "enter");
        assert_eq!(events[1], ("leave", events[0].1));
        assert_eq!(events[2].0, "enter");
        assert_eq!(events[3], ("leave", events[2].1));
        assert!(table.is_empty());
    }
}
