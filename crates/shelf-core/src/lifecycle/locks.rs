//! Keyed mutual exclusion per library set.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::library::SetId;

/// Serializes mutations per library set within one process.
///
/// Locking one set never blocks callers working on another.
#[derive(Debug, Clone, Default)]
pub struct SetLocks {
    inner: Arc<LockTable>,
}

#[derive(Debug, Default)]
struct LockTable {
    busy: Mutex<HashSet<SetId>>,
    released: Condvar,
}

/// Holds the lock on one set until dropped.
#[derive(Debug)]
pub struct SetGuard {
    table: Arc<LockTable>,
    set_id: SetId,
}

impl SetLocks {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `set_id` is free, then hold it.
    pub fn lock(&self, set_id: SetId) -> SetGuard {
        let mut busy = self.inner.busy_sets();
        while busy.contains(&set_id) {
            busy = self
                .inner
                .released
                .wait(busy)
                .unwrap_or_else(PoisonError::into_inner);
        }
        busy.insert(set_id);
        SetGuard {
            table: Arc::clone(&self.inner),
            set_id,
        }
    }

    /// Whether `set_id` is currently held.
    pub fn is_locked(&self, set_id: &SetId) -> bool {
        self.inner.busy_sets().contains(set_id)
    }
}

impl LockTable {
    fn busy_sets(&self) -> MutexGuard<'_, HashSet<SetId>> {
        self.busy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SetGuard {
    /// The set this guard holds.
    pub const fn set_id(&self) -> SetId {
        self.set_id
    }
}

impl Drop for SetGuard {
    fn drop(&mut self) {
        self.table.busy_sets().remove(&self.set_id);
        self.table.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn guard_releases_on_drop() {
        let locks = SetLocks::new();
        let set = SetId::new();
        {
            let guard = locks.lock(set);
            assert_eq!(guard.set_id(), set);
            assert!(locks.is_locked(&set));
        }
        assert!(!locks.is_locked(&set));
    }

    #[test]
    fn different_sets_do_not_block() {
        let locks = SetLocks::new();
        let _a = locks.lock(SetId::new());
        let _b = locks.lock(SetId::new());
    }

    #[test]
    fn same_set_is_serialized() {
        let locks = SetLocks::new();
        let set = SetId::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    let _guard = locks.lock(set);
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
