// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use parking_lot::Mutex;
use std::collections::HashSet;

/// An insertion-order-agnostic deduplication set over strings.
///
/// Grows monotonically for the lifetime of its owner and is never persisted.
/// Services use one per dedup concern: discovered names, visited URLs,
/// already-issued queries.
#[derive(Debug, Default)]
pub struct StringFilter {
    seen: Mutex<HashSet<String>>,
}

impl StringFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-and-insert. Returns true when `s` was already present.
    pub fn duplicate(&self, s: &str) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains(s) {
            return true;
        }
        seen.insert(s.to_string());
        false
    }

    /// Membership test without insertion.
    pub fn has(&self, s: &str) -> bool {
        self.seen.lock().contains(s)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_duplicate_is_test_and_insert() {
        let filter = StringFilter::new();
        assert!(!filter.duplicate("a.example.com"));
        assert!(filter.duplicate("a.example.com"));
        assert!(filter.duplicate("a.example.com"));
        assert!(!filter.duplicate("b.example.com"));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_has_does_not_insert() {
        let filter = StringFilter::new();
        assert!(!filter.has("a.example.com"));
        assert!(!filter.duplicate("a.example.com"));
        assert!(filter.has("a.example.com"));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_admits_exactly_once() {
        let filter = Arc::new(StringFilter::new());

        let mut handles = Vec::new();
        for _ in 0..32 {
            let filter = Arc::clone(&filter);
            handles.push(tokio::spawn(async move {
                !filter.duplicate("shared.example.com")
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(filter.len(), 1);
    }
}
