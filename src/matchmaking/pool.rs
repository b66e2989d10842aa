//! Registry of sessions waiting for a partner.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

/// Concurrent set of unpaired session ids with their pool-entry timestamps.
///
/// Membership is driven by the session actors: a session is listed here iff
/// it is currently waiting for a partner. Add and remove are idempotent so
/// actors can re-sync membership on repeated transitions.
#[derive(Debug, Default)]
pub struct UnpairedPool {
    entries: DashMap<String, DateTime<Utc>>,
}

impl UnpairedPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session to the pool. Re-adding refreshes the timestamp.
    pub fn add(&self, session_id: &str) {
        if self
            .entries
            .insert(session_id.to_string(), Utc::now())
            .is_none()
        {
            debug!(session_id = %session_id, "Session joined unpaired pool");
        }
    }

    /// Remove a session from the pool. Removing a non-member is a no-op.
    pub fn remove(&self, session_id: &str) {
        if self.entries.remove(session_id).is_some() {
            debug!(session_id = %session_id, "Session left unpaired pool");
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.contains_key(session_id)
    }

    /// Point-in-time snapshot of member ids. The pool can change immediately
    /// after, so callers must treat entries as candidates, not guarantees.
    pub fn list(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readd_refreshes_timestamp_without_duplicating() {
        let pool = UnpairedPool::new();
        pool.add("session_a");
        let first = *pool.entries.get("session_a").unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        pool.add("session_a");
        assert_eq!(pool.len(), 1);
        assert!(*pool.entries.get("session_a").unwrap() > first);
    }

    #[test]
    fn remove_is_idempotent() {
        let pool = UnpairedPool::new();
        pool.add("session_a");
        pool.remove("session_a");
        pool.remove("session_a");
        assert!(pool.is_empty());
        assert!(!pool.contains("session_a"));
    }

    #[test]
    fn list_snapshots_current_members() {
        let pool = UnpairedPool::new();
        pool.add("session_a");
        pool.add("session_b");
        pool.remove("session_a");

        assert_eq!(pool.list(), vec!["session_b".to_string()]);
    }
}
