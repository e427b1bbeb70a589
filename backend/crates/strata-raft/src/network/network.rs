//! Raft Network Implementation
//!
//! Provides the network transport for Raft RPCs using gRPC (tonic).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use openraft::error::{
    InstallSnapshotError, NetworkError, RPCError, RaftError as OpenRaftError, Unreachable,
};
use openraft::network::{
    RPCOption, RaftNetwork as OpenRaftNetwork, RaftNetworkFactory as OpenRaftNetworkFactory,
};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::transport::Channel;

use crate::network::service::call_remote;
use crate::network::RpcType;
use crate::storage::{StrataNode, StrataTypeConfig};
use crate::RaftError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn connect_lazy(rpc_addr: &str) -> Result<Channel, RaftError> {
    let endpoint = format!("http://{}", rpc_addr);
    let channel = Channel::from_shared(endpoint)
        .map_err(|e| RaftError::Config(format!("Invalid rpc_addr '{}': {}", rpc_addr, e)))?
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .connect_lazy();
    Ok(channel)
}

/// Network implementation for one peer
pub struct RaftNetwork {
    /// Target node ID
    target: u64,
    /// `None` when the peer's address could not be turned into an endpoint
    channel: Option<Channel>,
}

impl RaftNetwork {
    pub fn new(target: u64, channel: Option<Channel>) -> Self {
        Self { target, channel }
    }

    async fn send<Req, Resp, E>(
        &self,
        rpc_type: RpcType,
        rpc: &Req,
        option: &RPCOption,
    ) -> Result<Resp, RPCError<u64, StrataNode, E>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: std::error::Error,
    {
        let channel = self.channel.clone().ok_or_else(|| {
            let err = RaftError::Network(format!("No usable address for node {}", self.target));
            RPCError::Unreachable(Unreachable::new(&err))
        })?;

        let payload =
            crate::state_machine::encode(rpc).map_err(|e| RPCError::Network(NetworkError::new(&e)))?;

        let bytes = call_remote(channel, rpc_type, payload, option.hard_ttl())
            .await
            .map_err(|e| match e {
                RaftError::Network(_) => RPCError::Unreachable(Unreachable::new(&e)),
                other => RPCError::Network(NetworkError::new(&other)),
            })?;

        crate::state_machine::decode(&bytes).map_err(|e| RPCError::Network(NetworkError::new(&e)))
    }
}

impl OpenRaftNetwork<StrataTypeConfig> for RaftNetwork {
    async fn append_entries(
        &mut self,
        rpc: AppendEntriesRequest<StrataTypeConfig>,
        option: RPCOption,
    ) -> Result<AppendEntriesResponse<u64>, RPCError<u64, StrataNode, OpenRaftError<u64>>> {
        self.send(RpcType::AppendEntries, &rpc, &option).await
    }

    async fn install_snapshot(
        &mut self,
        rpc: InstallSnapshotRequest<StrataTypeConfig>,
        option: RPCOption,
    ) -> Result<
        InstallSnapshotResponse<u64>,
        RPCError<u64, StrataNode, OpenRaftError<u64, InstallSnapshotError>>,
    > {
        self.send(RpcType::InstallSnapshot, &rpc, &option).await
    }

    async fn vote(
        &mut self,
        rpc: VoteRequest<u64>,
        option: RPCOption,
    ) -> Result<VoteResponse<u64>, RPCError<u64, StrataNode, OpenRaftError<u64>>> {
        self.send(RpcType::Vote, &rpc, &option).await
    }
}

/// Factory for creating network instances
#[derive(Clone, Default)]
pub struct RaftNetworkFactory {
    /// Known nodes in the cluster
    nodes: Arc<RwLock<HashMap<u64, StrataNode>>>,
    /// Cached gRPC channels (node_id -> channel)
    channels: Arc<dashmap::DashMap<u64, Channel>>,
}

impl RaftNetworkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node in the cluster. A changed address drops the cached channel.
    pub fn register_node(&self, node_id: u64, node: StrataNode) {
        let mut nodes = self.nodes.write();
        let changed = nodes
            .get(&node_id)
            .map(|known| known.rpc_addr != node.rpc_addr)
            .unwrap_or(false);
        if changed {
            self.channels.remove(&node_id);
        }
        nodes.insert(node_id, node);
    }

    /// Remove a node from the cluster
    pub fn unregister_node(&self, node_id: u64) {
        let mut nodes = self.nodes.write();
        nodes.remove(&node_id);
        self.channels.remove(&node_id);
    }

    /// Get node info by node ID (for leader forwarding)
    pub fn get_node(&self, node_id: u64) -> Option<StrataNode> {
        let nodes = self.nodes.read();
        nodes.get(&node_id).cloned()
    }

    /// Channel to a registered node, created lazily and cached
    pub fn channel_for(&self, node_id: u64) -> Result<Channel, RaftError> {
        if let Some(ch) = self.channels.get(&node_id) {
            return Ok(ch.clone());
        }
        let node = self
            .get_node(node_id)
            .ok_or_else(|| RaftError::Network(format!("Unknown node {}", node_id)))?;
        let ch = connect_lazy(&node.rpc_addr)?;
        self.channels.insert(node_id, ch.clone());
        Ok(ch)
    }
}

impl OpenRaftNetworkFactory<StrataTypeConfig> for RaftNetworkFactory {
    type Network = RaftNetwork;

    async fn new_client(&mut self, target: u64, node: &StrataNode) -> Self::Network {
        self.register_node(target, node.clone());

        let channel = match self.channel_for(target) {
            Ok(ch) => Some(ch),
            Err(e) => {
                log::warn!("Cannot build channel to node {} ({}): {}", target, node, e);
                None
            }
        };

        RaftNetwork::new(target, channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(addr: &str) -> StrataNode {
        StrataNode {
            name: "node2".to_string(),
            rpc_addr: addr.to_string(),
            api_addr: "127.0.0.1:8080".to_string(),
        }
    }

    #[test]
    fn test_network_factory_registration() {
        let factory = RaftNetworkFactory::new();
        factory.register_node(1, node("127.0.0.1:9000"));
        assert_eq!(factory.get_node(1).map(|n| n.rpc_addr), Some("127.0.0.1:9000".to_string()));

        factory.unregister_node(1);
        assert!(factory.get_node(1).is_none());
    }

    #[test]
    fn test_channel_for_unknown_node() {
        let factory = RaftNetworkFactory::new();
        assert!(matches!(factory.channel_for(7), Err(RaftError::Network(_))));
    }

    #[tokio::test]
    async fn test_channel_is_cached_until_address_changes() {
        let factory = RaftNetworkFactory::new();
        factory.register_node(1, node("127.0.0.1:9000"));
        factory.channel_for(1).unwrap();
        assert_eq!(factory.channels.len(), 1);

        factory.register_node(1, node("127.0.0.1:9000"));
        assert_eq!(factory.channels.len(), 1);

        factory.register_node(1, node("127.0.0.1:9001"));
        assert!(factory.channels.is_empty());
    }

    #[test]
    fn test_invalid_address_is_a_config_error() {
        assert!(matches!(connect_lazy("not a uri\n"), Err(RaftError::Config(_))));
    }
}
