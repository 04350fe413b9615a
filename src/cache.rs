//! In-process response cache for read endpoints.
//!
//! Entries are grouped into namespaces. Every mutation reports which kind of
//! data changed and the cache drops the namespaces that kind of change can
//! affect. Invalidation never fails the mutation that triggered it: problems
//! are logged and the stale entry simply expires with its TTL.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Namespace for paginated task lists.
pub const NS_TASK_LIST: &str = "tasks";
/// Namespace for single-task views (details, graph, candidates, blockers).
pub const NS_TASK: &str = "task";
/// Namespace for dashboard counters and suggestions.
pub const NS_STATS: &str = "stats";
/// Namespace for room listings and room details.
pub const NS_ROOMS: &str = "rooms";

/// Categories of mutations that affect cached responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// A task was created, updated, deleted, or had its status changed.
    TaskChanged,
    /// A dependency edge was added or removed.
    DependencyChanged,
    /// A room was created, updated or deleted.
    RoomChanged,
}

impl MutationKind {
    /// Namespaces potentially affected by this kind of mutation.
    pub fn affected_namespaces(&self) -> &'static [&'static str] {
        match self {
            MutationKind::TaskChanged => &[NS_TASK_LIST, NS_TASK, NS_STATS, NS_ROOMS],
            MutationKind::DependencyChanged => &[NS_TASK],
            MutationKind::RoomChanged => &[NS_ROOMS, NS_TASK_LIST, NS_TASK],
        }
    }
}

struct Entry {
    value: Value,
    stored_at: Instant,
}

/// Namespaced TTL cache for JSON responses.
///
/// Thread-safe: uses an internal `Mutex` so it can be shared across handlers.
pub struct ResponseCache {
    enabled: bool,
    ttl: Duration,
    entries: Mutex<HashMap<String, HashMap<String, Entry>>>,
}

impl ResponseCache {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            enabled: true,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ttl: Duration::ZERO,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a fresh entry.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.lock().ok()?;
        let bucket = entries.get_mut(namespace)?;
        match bucket.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                bucket.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value. Expired entries in the same namespace are swept first.
    /// Failures are logged and ignored.
    pub fn put(&self, namespace: &str, key: &str, value: Value) {
        if !self.enabled {
            return;
        }
        match self.entries.lock() {
            Ok(mut entries) => {
                let bucket = entries.entry(namespace.to_string()).or_default();
                let before = bucket.len();
                bucket.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
                let swept = before - bucket.len();
                if swept > 0 {
                    tracing::trace!(namespace, swept, "Swept expired cache entries");
                }
                bucket.insert(
                    key.to_string(),
                    Entry {
                        value,
                        stored_at: Instant::now(),
                    },
                );
            }
            Err(_) => tracing::warn!(namespace, key, "Response cache lock poisoned; skipping store"),
        }
    }

    /// Drop every entry in a namespace. Returns how many entries were removed.
    pub fn invalidate_namespace(&self, namespace: &str) -> usize {
        if !self.enabled {
            return 0;
        }
        match self.entries.lock() {
            Ok(mut entries) => {
                let removed = entries.remove(namespace).map(|b| b.len()).unwrap_or(0);
                tracing::debug!(namespace, removed, "Cleared cache namespace");
                removed
            }
            Err(_) => {
                tracing::warn!(namespace, "Failed to invalidate cache namespace: lock poisoned");
                0
            }
        }
    }

    /// Drop every namespace a mutation of `kind` can affect.
    pub fn invalidate(&self, kind: MutationKind) -> usize {
        kind.affected_namespaces()
            .iter()
            .map(|ns| self.invalidate_namespace(ns))
            .sum()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
