//! In-memory invocation cache backing deduplication.
//!
//! Each entry holds the shared execution future for one logical invocation,
//! which serves both roles the cache has: concurrent callers within the
//! window converge on the in-flight future, and callers arriving after it
//! settles get the settled result without a new remote call.
//!
//! Pruning is opportunistic on every insert; there is no background timer.
//! A size cap bounds memory in long-lived processes, evicting oldest-first.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use tokio::time::Instant;

use super::InvokeError;

/// Shared handle to a single (possibly in-flight) invocation outcome.
pub(crate) type SharedInvocation = Shared<BoxFuture<'static, Result<Value, InvokeError>>>;

pub(crate) struct CacheEntry {
    stamped_at: Instant,
    window: Duration,
    invocation: SharedInvocation,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.stamped_at) < self.window
    }
}

pub(crate) struct InvocationCache {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl InvocationCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return the live invocation for `key`, or install the one built by
    /// `make`. The boolean is `true` for the caller that installed it, which
    /// is the caller responsible for re-stamping on settle.
    ///
    /// The entry API keeps check-and-insert atomic, so at most one execution
    /// future exists per live key even under concurrent callers.
    pub fn get_or_insert_with<F>(
        &self,
        key: &str,
        window: Duration,
        make: F,
    ) -> (SharedInvocation, bool)
    where
        F: FnOnce() -> SharedInvocation,
    {
        self.prune();
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    (occupied.get().invocation.clone(), false)
                } else {
                    let invocation = make();
                    occupied.insert(CacheEntry {
                        stamped_at: now,
                        window,
                        invocation: invocation.clone(),
                    });
                    (invocation, true)
                }
            }
            Entry::Vacant(vacant) => {
                let invocation = make();
                vacant.insert(CacheEntry {
                    stamped_at: now,
                    window,
                    invocation: invocation.clone(),
                });
                (invocation, true)
            }
        }
    }

    /// Re-stamp an entry so its window runs from settle time.
    pub fn touch(&self, key: &str) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.stamped_at = Instant::now();
        }
    }

    /// Drop expired entries, then oldest entries past the size cap.
    pub fn prune(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));

        if self.entries.len() > self.max_entries {
            let mut stamps: Vec<(String, Instant)> = self
                .entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.stamped_at))
                .collect();
            stamps.sort_by_key(|(_, stamped_at)| *stamped_at);
            let excess = stamps.len().saturating_sub(self.max_entries);
            for (key, _) in stamps.into_iter().take(excess) {
                self.entries.remove(&key);
            }
        }
    }
}
