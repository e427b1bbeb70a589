//! Raft Manager Configuration
//!
//! Runtime configuration for the RaftManager, built from the TOML-parseable
//! [`strata_commons::ServerConfig`]. Durations are resolved here so the
//! consensus code never deals with raw millisecond fields.

use std::time::Duration;

use strata_commons::models::NodeId;
use strata_commons::ServerConfig;

use crate::storage::StrataNode;

/// Runtime configuration for the Raft Manager
#[derive(Debug, Clone)]
pub struct RaftManagerConfig {
    /// Cluster identifier, used as the openraft cluster name
    pub cluster_id: String,

    /// This node's name
    pub node_id: NodeId,

    /// This node's RPC address for Raft communication
    pub rpc_addr: String,

    /// This node's API address for client requests
    pub api_addr: String,

    /// Peer nodes in the cluster
    pub peers: Vec<PeerNode>,

    /// Whether this node bootstraps a fresh cluster
    pub bootstrap: bool,

    /// Raft heartbeat interval in milliseconds
    pub heartbeat_interval_ms: u64,

    /// Raft election timeout range (min, max) in milliseconds
    pub election_timeout_ms: (u64, u64),

    /// Snapshot after this many applied entries
    pub snapshot_logs_since_last: u64,

    /// Upper bound on waiting for a proposal to be committed and applied
    pub propose_timeout: Duration,

    /// Upper bound on a linearizable read barrier
    pub read_timeout: Duration,
}

impl Default for RaftManagerConfig {
    fn default() -> Self {
        Self {
            cluster_id: "strata".to_string(),
            node_id: NodeId::new("node1"),
            rpc_addr: "127.0.0.1:8300".to_string(),
            api_addr: "127.0.0.1:8080".to_string(),
            peers: vec![],
            bootstrap: true,
            heartbeat_interval_ms: 250,
            election_timeout_ms: (500, 1000),
            snapshot_logs_since_last: 1000,
            propose_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(3),
        }
    }
}

impl RaftManagerConfig {
    /// Create a single-node configuration.
    ///
    /// The same Raft path is used as in cluster mode; the node simply elects
    /// itself.
    pub fn for_single_node(node_name: impl Into<String>, rpc_addr: impl Into<String>) -> Self {
        Self {
            node_id: NodeId::new(node_name),
            rpc_addr: rpc_addr.into(),
            peers: vec![],
            bootstrap: true,
            ..Default::default()
        }
    }

    /// Raft id of this node
    pub fn raft_id(&self) -> u64 {
        self.node_id.raft_id()
    }

    /// Membership node descriptor for this node
    pub fn self_node(&self) -> StrataNode {
        StrataNode::new(self.node_id.as_str(), &self.rpc_addr, &self.api_addr)
    }
}

/// Convert from the TOML-parseable config to the runtime RaftManagerConfig
impl From<&ServerConfig> for RaftManagerConfig {
    fn from(config: &ServerConfig) -> Self {
        let cluster = &config.cluster;
        Self {
            cluster_id: cluster.cluster_id.clone(),
            node_id: config.node_id(),
            rpc_addr: cluster.rpc_addr.clone(),
            api_addr: config.node.api_addr.clone(),
            peers: cluster.peers.iter().cloned().map(PeerNode::from).collect(),
            bootstrap: cluster.bootstrap,
            heartbeat_interval_ms: cluster.heartbeat_interval_ms,
            election_timeout_ms: cluster.election_timeout_ms,
            snapshot_logs_since_last: cluster.snapshot_logs_since_last,
            propose_timeout: Duration::from_millis(cluster.propose_timeout_ms),
            read_timeout: Duration::from_millis(cluster.read_timeout_ms),
        }
    }
}

/// Runtime configuration for a peer node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerNode {
    /// Peer's node name
    pub node_id: NodeId,

    /// Peer's RPC address for Raft communication
    pub rpc_addr: String,

    /// Peer's API address for client requests
    pub api_addr: String,
}

impl PeerNode {
    pub fn raft_id(&self) -> u64 {
        self.node_id.raft_id()
    }

    pub fn to_node(&self) -> StrataNode {
        StrataNode::new(self.node_id.as_str(), &self.rpc_addr, &self.api_addr)
    }
}

impl From<strata_commons::config::PeerConfig> for PeerNode {
    fn from(peer: strata_commons::config::PeerConfig) -> Self {
        Self {
            node_id: NodeId::new(peer.name),
            rpc_addr: peer.rpc_addr,
            api_addr: peer.api_addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RaftManagerConfig::default();
        assert_eq!(config.node_id, NodeId::new("node1"));
        assert_eq!(config.raft_id(), NodeId::new("node1").raft_id());
        assert!(config.peers.is_empty());
        assert_eq!(config.self_node().name, "node1");
    }

    #[test]
    fn test_peer_node_from() {
        let peer_config = strata_commons::config::PeerConfig {
            name: "node2".to_string(),
            rpc_addr: "127.0.0.1:8301".to_string(),
            api_addr: "127.0.0.1:8081".to_string(),
        };

        let peer = PeerNode::from(peer_config);

        assert_eq!(peer.node_id, NodeId::new("node2"));
        assert_eq!(peer.rpc_addr, "127.0.0.1:8301");
        assert_eq!(peer.to_node().api_addr, "127.0.0.1:8081");
    }

    #[test]
    fn test_from_server_config() {
        let server = ServerConfig::from_toml_str(
            r#"
            [node]
            name = "node1"
            api_addr = "127.0.0.1:8080"

            [cluster]
            rpc_addr = "127.0.0.1:8300"
            propose_timeout_ms = 1500

            [[cluster.peers]]
            name = "node2"
            rpc_addr = "127.0.0.1:8301"
            api_addr = "127.0.0.1:8081"
            "#,
        )
        .unwrap();

        let config = RaftManagerConfig::from(&server);
        assert_eq!(config.propose_timeout, Duration::from_millis(1500));
        assert_eq!(config.peers.len(), 1);
        assert_eq!(config.peers[0].node_id.as_str(), "node2");
    }
}
