//! Table of requests forwarded to the remote endpoint and not yet answered.

use mcp_types::RequestId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: String,
    pub started_at: Instant,
}

impl PendingRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Outstanding requests keyed by correlation id.
///
/// Owned by the bridge loop and only touched from there.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: HashMap<RequestId, PendingRequest>,
}

impl PendingRequests {
    /// Track `id`. Returns `false` if it is already outstanding.
    pub fn insert(&mut self, id: RequestId, method: impl Into<String>) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, PendingRequest::new(method));
        true
    }

    pub fn remove(&mut self, id: &RequestId) -> Option<PendingRequest> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry, oldest first.
    pub fn drain(&mut self) -> Vec<(RequestId, PendingRequest)> {
        let mut entries: Vec<_> = self.entries.drain().collect();
        entries.sort_by_key(|(_, pending)| pending.started_at);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_requests_insert_remove() {
        let mut pending = PendingRequests::default();
        assert!(pending.insert(RequestId::from(42), "tools/call"));
        assert!(pending.insert(RequestId::from("42"), "tools/list"));
        assert_eq!(pending.len(), 2);

        let entry = pending.remove(&RequestId::from(42)).expect("entry");
        assert_eq!(entry.method, "tools/call");
        assert!(pending.remove(&RequestId::from(42)).is_none());
        assert!(pending.contains(&RequestId::from("42")));
    }

    #[test]
    fn test_duplicate_id_is_refused() {
        let mut pending = PendingRequests::default();
        assert!(pending.insert(RequestId::from(1), "ping"));
        assert!(!pending.insert(RequestId::from(1), "tools/list"));
        assert_eq!(pending.remove(&RequestId::from(1)).unwrap().method, "ping");
    }

    #[test]
    fn test_drain_empties_table() {
        let mut pending = PendingRequests::default();
        pending.insert(RequestId::from(1), "a");
        pending.insert(RequestId::from(2), "b");

        let drained = pending.drain();
        assert_eq!(drained.len(), 2);
        assert!(pending.is_empty());
    }
}
