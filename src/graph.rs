// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Graph Collaborator Boundary
 * Alias bookkeeping consulted by the name pipeline
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use parking_lot::Mutex;
use std::collections::HashSet;

/// Correlation parameters for a graph query.
#[derive(Debug, Clone)]
pub struct DataOpts {
    pub uuid: String,
    pub name: String,
    pub domain: String,
}

/// The store the name pipeline consults before promoting a subdomain.
/// Synchronous by contract; implementations keep queries cheap.
pub trait DataGraph: Send + Sync {
    /// Whether `opts.name` is recorded as a CNAME alias node. Aliases are
    /// never promoted as newly discovered subdomains.
    fn is_cname_node(&self, opts: &DataOpts) -> bool;

    /// Record that `opts.name` is an alias pointing at `target`.
    fn insert_cname(&self, opts: &DataOpts, target: &str);
}

/// In-memory graph for a single run. The run uuid in [`DataOpts`] is part
/// of the boundary contract; this single-run store does not partition by it.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    aliases: Mutex<HashSet<String>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.lock().len()
    }
}

impl DataGraph for MemoryGraph {
    fn is_cname_node(&self, opts: &DataOpts) -> bool {
        self.aliases.lock().contains(&opts.name)
    }

    fn insert_cname(&self, opts: &DataOpts, _target: &str) {
        self.aliases.lock().insert(opts.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(name: &str) -> DataOpts {
        DataOpts {
            uuid: "run-1".to_string(),
            name: name.to_string(),
            domain: "example.com".to_string(),
        }
    }

    #[test]
    fn test_alias_round_trip() {
        let graph = MemoryGraph::new();
        assert!(!graph.is_cname_node(&opts("cdn.example.com")));

        graph.insert_cname(&opts("cdn.example.com"), "edge.provider.net");
        assert!(graph.is_cname_node(&opts("cdn.example.com")));
        assert!(!graph.is_cname_node(&opts("www.example.com")));
        assert_eq!(graph.alias_count(), 1);
    }
}
