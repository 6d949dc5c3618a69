//! In-flight load tracking (single-flight guard).
//!
//! The first caller to claim a key becomes the leader and performs the
//! load; later callers for the same key block on the leader's slot and
//! receive a clone of its result. The slot is published before the key is
//! released, so at most one content load runs per key at any time.
//!
//! Leaders that wait on another key register wait-for edges from every key
//! on their dependency chain to the key they wait on. A wait that would close
//! a loop in that graph is refused, so loads entering a dependency cycle
//! from opposite ends never block on each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

use super::error::ModuleError;
use super::options::LoadResult;

/// Options of the leading load that shape its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LoadProfile {
    pub validate: bool,
    pub recursive: bool,
}

/// A load result that is still being produced.
pub(crate) struct InFlightLoad {
    result: Mutex<Option<LoadResult>>,
    ready: Condvar,
    profile: LoadProfile,
}

impl InFlightLoad {
    fn new(profile: LoadProfile) -> Self {
        Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
            profile,
        }
    }

    /// Profile of the load whose result waiters receive.
    pub(crate) fn profile(&self) -> LoadProfile {
        self.profile
    }

    fn complete(&self, result: LoadResult) {
        let mut slot = self.result.lock();
        *slot = Some(result);
        self.ready.notify_all();
    }

    /// Block until the leader publishes or `deadline` passes.
    pub(crate) fn wait_until(&self, deadline: Instant) -> Option<LoadResult> {
        let mut slot = self.result.lock();
        while slot.is_none() {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.clone()
    }
}

pub(crate) enum Claim<'a> {
    Leader(LeaderGuard<'a>),
    Waiter(Arc<InFlightLoad>),
}

/// Held by the leader for the duration of a load.
///
/// Dropping the guard without calling `finish` publishes a failure so that
/// waiters are never stranded.
pub(crate) struct LeaderGuard<'a> {
    table: &'a InFlightTable,
    key: String,
    slot: Arc<InFlightLoad>,
    finished: bool,
}

impl LeaderGuard<'_> {
    /// Publish the result to waiters, release the key and hand it back.
    pub(crate) fn finish(mut self, result: LoadResult) -> LoadResult {
        self.slot.complete(result.clone());
        self.table.loads.remove(&self.key);
        self.finished = true;
        result
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.slot.complete(LoadResult::failed(
                ModuleError::LoadFailure {
                    path: self.key.clone().into(),
                    reason: "load abandoned".to_string(),
                },
                std::time::Duration::ZERO,
            ));
            self.table.loads.remove(&self.key);
        }
    }
}

/// Registered wait-for edges; removed when dropped.
pub(crate) struct WaitGuard<'a> {
    table: &'a InFlightTable,
    from: Vec<String>,
    target: String,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let mut edges = self.table.waits.lock();
        for key in &self.from {
            if let Some(targets) = edges.get_mut(key) {
                if let Some(pos) = targets.iter().position(|t| *t == self.target) {
                    targets.swap_remove(pos);
                }
                if targets.is_empty() {
                    edges.remove(key);
                }
            }
        }
    }
}

/// Key → in-flight load map.
#[derive(Default)]
pub(crate) struct InFlightTable {
    loads: DashMap<String, Arc<InFlightLoad>>,
    /// Wait-for graph: a key being loaded → keys its load is waiting on.
    waits: Mutex<HashMap<String, Vec<String>>>,
    joins: AtomicU64,
}

impl InFlightTable {
    pub(crate) fn claim(&self, key: &str, profile: LoadProfile) -> Claim<'_> {
        match self.loads.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                self.joins.fetch_add(1, Ordering::Relaxed);
                Claim::Waiter(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                let slot = Arc::new(InFlightLoad::new(profile));
                entry.insert(Arc::clone(&slot));
                Claim::Leader(LeaderGuard {
                    table: self,
                    key: key.to_string(),
                    slot,
                    finished: false,
                })
            }
        }
    }

    /// Register that the loads of `chain` wait on `target`.
    ///
    /// Returns `None` when `target` already waits, directly or through other
    /// loads, on a key in `chain`; waiting would then never end.
    pub(crate) fn begin_wait(&self, chain: &[&str], target: &str) -> Option<WaitGuard<'_>> {
        let mut edges = self.waits.lock();

        let mut stack = vec![target];
        let mut seen: Vec<&str> = Vec::new();
        while let Some(key) = stack.pop() {
            if chain.contains(&key) {
                return None;
            }
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            if let Some(next) = edges.get(key) {
                stack.extend(next.iter().map(String::as_str));
            }
        }

        for key in chain {
            edges
                .entry(key.to_string())
                .or_default()
                .push(target.to_string());
        }
        Some(WaitGuard {
            table: self,
            from: chain.iter().map(|k| k.to_string()).collect(),
            target: target.to_string(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.loads.len()
    }

    /// Number of callers that joined an existing load instead of starting one.
    pub(crate) fn joins(&self) -> u64 {
        self.joins.load(Ordering::Relaxed)
    }

    pub(crate) fn reset_counters(&self) {
        self.joins.store(0, Ordering::Relaxed);
    }
}
