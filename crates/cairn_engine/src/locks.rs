//! Per-key locks for pessimistic transactions.

use crate::error::{EngineError, EngineResult};
use crate::types::FamilyId;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Key identity used by the lock table.
pub(crate) type LockKey = (FamilyId, Vec<u8>);

/// Exclusive key locks owned by transaction ids.
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    owners: Mutex<HashMap<LockKey, u64>>,
    released: Condvar,
}

impl LockTable {
    /// Locks `key` for `owner`.
    ///
    /// With `wait == None` the call never blocks and fails with `Incomplete`
    /// on contention; otherwise it waits up to `wait` and fails with
    /// `TimedOut`. Returns `true` if the lock was newly taken.
    pub(crate) fn acquire(
        &self,
        owner: u64,
        key: &LockKey,
        wait: Option<Duration>,
    ) -> EngineResult<bool> {
        let deadline = wait.map(|timeout| Instant::now() + timeout);
        let mut owners = self.owners.lock();
        loop {
            match owners.get(key) {
                None => {
                    owners.insert(key.clone(), owner);
                    return Ok(true);
                }
                Some(holder) if *holder == owner => return Ok(false),
                Some(_) => {
                    let Some(deadline) = deadline else {
                        return Err(EngineError::Incomplete);
                    };
                    if self.released.wait_until(&mut owners, deadline).timed_out()
                        && owners.get(key).is_some_and(|holder| *holder != owner)
                    {
                        return Err(EngineError::TimedOut {
                            family_id: key.0.as_u32(),
                        });
                    }
                }
            }
        }
    }

    /// Locks every key or none of them.
    pub(crate) fn acquire_all(
        &self,
        owner: u64,
        keys: &[LockKey],
        wait: Option<Duration>,
    ) -> EngineResult<Vec<LockKey>> {
        let mut taken = Vec::with_capacity(keys.len());
        for key in keys {
            match self.acquire(owner, key, wait) {
                Ok(true) => taken.push(key.clone()),
                Ok(false) => {}
                Err(err) => {
                    self.release(owner, &taken);
                    return Err(err);
                }
            }
        }
        Ok(taken)
    }

    /// Releases the given keys if held by `owner` and wakes waiters.
    pub(crate) fn release(&self, owner: u64, keys: &[LockKey]) {
        if keys.is_empty() {
            return;
        }
        let mut owners = self.owners.lock();
        for key in keys {
            if owners.get(key) == Some(&owner) {
                owners.remove(key);
            }
        }
        drop(owners);
        self.released.notify_all();
    }

    /// Number of held locks.
    pub(crate) fn len(&self) -> usize {
        self.owners.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn key(k: &[u8]) -> LockKey {
        (FamilyId::DEFAULT, k.to_vec())
    }

    #[test]
    fn reentrant_for_same_owner() {
        let table = LockTable::default();
        assert!(table.acquire(1, &key(b"a"), None).unwrap());
        assert!(!table.acquire(1, &key(b"a"), None).unwrap());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn contention_without_wait_is_incomplete() {
        let table = LockTable::default();
        table.acquire(1, &key(b"a"), None).unwrap();
        assert!(matches!(
            table.acquire(2, &key(b"a"), None),
            Err(EngineError::Incomplete)
        ));
    }

    #[test]
    fn contention_with_wait_times_out() {
        let table = LockTable::default();
        table.acquire(1, &key(b"a"), None).unwrap();
        assert!(matches!(
            table.acquire(2, &key(b"a"), Some(Duration::from_millis(20))),
            Err(EngineError::TimedOut { .. })
        ));
    }

    #[test]
    fn waiter_wakes_on_release() {
        let table = Arc::new(LockTable::default());
        table.acquire(1, &key(b"a"), None).unwrap();

        let waiter = {
            let table = Arc::clone(&table);
            thread::spawn(move || table.acquire(2, &key(b"a"), Some(Duration::from_secs(5))))
        };
        thread::sleep(Duration::from_millis(20));
        table.release(1, &[key(b"a")]);

        assert!(waiter.join().unwrap().unwrap());
    }

    #[test]
    fn acquire_all_is_all_or_nothing() {
        let table = LockTable::default();
        table.acquire(9, &key(b"b"), None).unwrap();
        assert!(table
            .acquire_all(1, &[key(b"a"), key(b"b")], None)
            .is_err());
        assert_eq!(table.len(), 1);
    }
}
