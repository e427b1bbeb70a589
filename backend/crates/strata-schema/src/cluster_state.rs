//! Cluster topology as seen by the schema layer
//!
//! Shard placement needs the list of node names and `JoinNode` needs to
//! resolve a node name to a host before anything is proposed.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use strata_commons::ServerConfig;

/// Node directory consulted by the planner and the handler
pub trait ClusterState: Send + Sync {
    /// Every known node name, sorted
    fn all_names(&self) -> Vec<String>;

    fn local_name(&self) -> String;

    /// Advertised address of `node`, if known
    fn node_hostname(&self, node: &str) -> Option<String>;
}

/// Directory seeded from the static peer list and updated as nodes are
/// discovered.
#[derive(Debug)]
pub struct MemberDirectory {
    local: String,
    nodes: RwLock<BTreeMap<String, String>>,
}

impl MemberDirectory {
    pub fn new(local: impl Into<String>, local_addr: impl Into<String>) -> Self {
        let local = local.into();
        let mut nodes = BTreeMap::new();
        nodes.insert(local.clone(), local_addr.into());
        Self {
            local,
            nodes: RwLock::new(nodes),
        }
    }

    /// Local node plus every `[[cluster.peers]]` entry. Peers without an API
    /// address are reachable by their RPC address.
    pub fn from_config(config: &ServerConfig) -> Self {
        let directory = Self::new(config.node.name.clone(), config.node.api_addr.clone());
        for peer in &config.cluster.peers {
            let addr = if peer.api_addr.is_empty() {
                &peer.rpc_addr
            } else {
                &peer.api_addr
            };
            directory.register(&peer.name, addr);
        }
        directory
    }

    pub fn register(&self, node: &str, addr: &str) {
        self.nodes.write().insert(node.to_string(), addr.to_string());
    }

    /// The local node is never removed
    pub fn unregister(&self, node: &str) -> bool {
        if node == self.local {
            return false;
        }
        self.nodes.write().remove(node).is_some()
    }
}

impl ClusterState for MemberDirectory {
    fn all_names(&self) -> Vec<String> {
        self.nodes.read().keys().cloned().collect()
    }

    fn local_name(&self) -> String {
        self.local.clone()
    }

    fn node_hostname(&self, node: &str) -> Option<String> {
        self.nodes.read().get(node).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_commons::config::PeerConfig;

    #[test]
    fn test_from_config() {
        let mut config = ServerConfig::default();
        config.node.name = "node1".into();
        config.node.api_addr = "10.0.0.1:8080".into();
        config.cluster.peers = vec![
            PeerConfig {
                name: "node2".into(),
                rpc_addr: "10.0.0.2:8300".into(),
                api_addr: "10.0.0.2:8080".into(),
            },
            PeerConfig {
                name: "node3".into(),
                rpc_addr: "10.0.0.3:8300".into(),
                api_addr: String::new(),
            },
        ];

        let directory = MemberDirectory::from_config(&config);
        assert_eq!(directory.all_names(), vec!["node1", "node2", "node3"]);
        assert_eq!(directory.local_name(), "node1");
        assert_eq!(directory.node_hostname("node2").as_deref(), Some("10.0.0.2:8080"));
        assert_eq!(directory.node_hostname("node3").as_deref(), Some("10.0.0.3:8300"));
        assert!(directory.node_hostname("node9").is_none());
    }

    #[test]
    fn test_local_node_cannot_be_unregistered() {
        let directory = MemberDirectory::new("node1", "127.0.0.1:8080");
        directory.register("node2", "127.0.0.2:8080");
        assert!(!directory.unregister("node1"));
        assert!(directory.unregister("node2"));
        assert_eq!(directory.all_names(), vec!["node1"]);
    }
}
