//! Keyed mutual exclusion
//!
//! [`KeyedLocks`] hands out exclusive access per string key. Two callers
//! holding different keys proceed concurrently; a caller asking for a key
//! that is already held blocks until the holder drops its [`LockGuard`].
//!
//! Several keys may be taken at once with [`KeyedLocks::acquire_all`]. The
//! whole set is claimed atomically, so callers that need overlapping sets
//! cannot deadlock on each other.

use log::trace;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Registry of held keys shared by every worker of a run
#[derive(Debug, Default)]
pub struct KeyedLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free, then hold it until the guard drops
    pub fn acquire(&self, key: impl Into<String>) -> LockGuard<'_> {
        self.acquire_all([key.into()])
    }

    /// Block until every key in `keys` is free, then hold all of them
    ///
    /// Duplicate keys are collapsed. An empty set returns a guard that
    /// holds nothing.
    pub fn acquire_all<I, K>(&self, keys: I) -> LockGuard<'_>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut held = self.lock_held();
        while keys.iter().any(|k| held.contains(k)) {
            trace!("waiting for lock on {}", keys.join(", "));
            held = match self.released.wait(held) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        for key in &keys {
            held.insert(key.clone());
        }
        drop(held);

        LockGuard { locks: self, keys }
    }

    /// Whether `key` is currently held by anyone
    pub fn is_held(&self, key: &str) -> bool {
        self.lock_held().contains(key)
    }

    /// Number of keys currently held
    pub fn held_count(&self) -> usize {
        self.lock_held().len()
    }

    fn lock_held(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panicking holder still releases its keys in Drop, so the set stays consistent.
        match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Releases its keys when dropped, on every exit path
#[derive(Debug)]
#[must_use = "the keys are released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    locks: &'a KeyedLocks,
    keys: Vec<String>,
}

impl LockGuard<'_> {
    /// Keys held by this guard, sorted
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let mut held = self.locks.lock_held();
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}
