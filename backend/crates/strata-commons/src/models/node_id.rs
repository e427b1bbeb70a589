//! Node identifier type for cluster deployments
//!
//! Nodes are addressed by a stable, human readable name (for example
//! `"node-1"`). Consensus needs a numeric identifier, which is derived
//! deterministically from the name so that every member computes the same
//! value without coordination.

use serde::{Deserialize, Serialize};
use std::fmt;
use twox_hash::XxHash64;

/// Seed used when hashing node names into consensus identifiers.
const RAFT_ID_SEED: u64 = 0x5354_5241_5441; // "STRATA"

/// Node identifier for cluster deployments
///
/// Configured via server.toml `[node] name = "node-1"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new node ID from its name
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the node name
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric identifier used by the consensus layer.
    ///
    /// Stable across processes and platforms (xxHash64 over the UTF-8 name).
    pub fn raft_id(&self) -> u64 {
        raft_id_for(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Derive the consensus identifier for a node name.
pub fn raft_id_for(name: &str) -> u64 {
    XxHash64::oneshot(RAFT_ID_SEED, name.as_bytes())
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for NodeId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_creation() {
        let node_id = NodeId::new("node-1");
        assert_eq!(node_id.as_str(), "node-1");
    }

    #[test]
    fn test_node_id_display() {
        let node_id = NodeId::from("node-7");
        assert_eq!(format!("{}", node_id), "node-7");
    }

    #[test]
    fn test_raft_id_is_deterministic() {
        let a = NodeId::new("node-1");
        let b = NodeId::new(String::from("node-1"));
        assert_eq!(a.raft_id(), b.raft_id());
        assert_eq!(a.raft_id(), raft_id_for("node-1"));
    }

    #[test]
    fn test_raft_id_differs_per_name() {
        assert_ne!(NodeId::new("node-1").raft_id(), NodeId::new("node-2").raft_id());
    }

    #[test]
    fn test_node_id_ordering() {
        let mut ids = vec![NodeId::new("c"), NodeId::new("a"), NodeId::new("b")];
        ids.sort();
        let names: Vec<&str> = ids.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
