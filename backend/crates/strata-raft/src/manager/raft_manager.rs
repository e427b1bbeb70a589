//! Raft Manager - Central orchestration for the meta Raft group
//!
//! Owns the single consensus group that replicates schema metadata and
//! membership, and serves the RPC handlers peers call into.

use std::collections::BTreeSet;
use std::sync::Arc;

use openraft::raft::{AppendEntriesRequest, InstallSnapshotRequest, VoteRequest};
use openraft::RaftMetrics;
use parking_lot::RwLock;
use strata_commons::constants::META_GROUP;
use strata_commons::models::{raft_id_for, NodeId};

use crate::cluster_types::ClusterStats;
use crate::commands::{MetaCommand, MetaResponse};
use crate::manager::raft_group::RaftInstance;
use crate::manager::{RaftGroup, RaftManagerConfig};
use crate::network::{AddNodeRequest, ReadIndexResponse, RemoveNodeRequest, RpcType};
use crate::state_machine::{decode, encode, MetaStateMachine, SchemaState};
use crate::storage::{StrataNode, StrataTypeConfig};
use crate::RaftError;

/// Central manager for the meta Raft group
///
/// Orchestrates:
/// - Group lifecycle (startup, bootstrap, shutdown)
/// - Proposals and linearizable reads with leader forwarding
/// - Membership changes
pub struct RaftManager {
    node_id: NodeId,
    raft_id: u64,

    meta: Arc<RaftGroup<MetaStateMachine>>,
    state_machine: Arc<MetaStateMachine>,

    started: RwLock<bool>,
    config: RaftManagerConfig,
}

impl std::fmt::Debug for RaftManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaftManager")
            .field("node_id", &self.node_id)
            .field("raft_id", &self.raft_id)
            .field("started", &*self.started.read())
            .finish_non_exhaustive()
    }
}

impl RaftManager {
    /// Create a new Raft manager
    pub fn new(config: RaftManagerConfig) -> Self {
        let state_machine = Arc::new(MetaStateMachine::new());
        let meta = Arc::new(RaftGroup::new(META_GROUP, state_machine.clone(), &config));
        Self {
            node_id: config.node_id.clone(),
            raft_id: config.raft_id(),
            meta,
            state_machine,
            started: RwLock::new(false),
            config,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn raft_id(&self) -> u64 {
        self.raft_id
    }

    pub fn config(&self) -> &RaftManagerConfig {
        &self.config
    }

    pub fn meta(&self) -> &Arc<RaftGroup<MetaStateMachine>> {
        &self.meta
    }

    pub fn state_machine(&self) -> &Arc<MetaStateMachine> {
        &self.state_machine
    }

    /// Get OpenRaft metrics for the meta group
    pub fn metrics(&self) -> Option<RaftMetrics<u64, StrataNode>> {
        self.meta.metrics()
    }

    pub fn is_started(&self) -> bool {
        *self.started.read()
    }

    pub fn is_leader(&self) -> bool {
        self.meta.is_leader()
    }

    pub fn current_leader(&self) -> Option<u64> {
        self.meta.current_leader()
    }

    /// Start the meta group and begin participating in consensus
    pub async fn start(&self) -> Result<(), RaftError> {
        if self.is_started() {
            log::warn!("RaftManager already started, skipping");
            return Ok(());
        }

        log::info!("[CLUSTER] Node: {} (raft id {})", self.node_id, self.raft_id);
        log::info!("[CLUSTER] RPC Address: {}", self.config.rpc_addr);
        log::info!("[CLUSTER] API Address: {}", self.config.api_addr);
        log::info!("[CLUSTER] Peers configured: {}", self.config.peers.len());
        for peer in &self.config.peers {
            log::info!(
                "[CLUSTER]   - Peer {}: rpc={}, api={}",
                peer.node_id,
                peer.rpc_addr,
                peer.api_addr
            );
            self.meta.register_peer(peer.raft_id(), peer.to_node());
        }

        self.meta.start(self.raft_id, &self.config).await?;
        *self.started.write() = true;

        log::info!("[CLUSTER] Raft started on node {}", self.node_id);
        Ok(())
    }

    /// Bootstrap the cluster (first node only), then add configured peers
    /// as voters. Already-initialized groups are left untouched.
    pub async fn initialize_cluster(&self) -> Result<(), RaftError> {
        if !self.is_started() {
            return Err(RaftError::NotStarted("RaftManager not started".to_string()));
        }

        if self.meta.is_initialized().await? {
            log::info!("[CLUSTER] Meta group already initialized, skipping bootstrap");
            return Ok(());
        }

        let self_node = self.config.self_node();
        log::info!(
            "[CLUSTER] Bootstrapping cluster on {} (rpc={}, api={})",
            self.node_id,
            self_node.rpc_addr,
            self_node.api_addr
        );
        self.meta.initialize(self.raft_id, self_node).await?;

        if !self.config.peers.is_empty() {
            log::info!("Adding {} peer nodes to cluster...", self.config.peers.len());
            for peer in &self.config.peers {
                match self
                    .add_node_local(peer.node_id.as_str(), &peer.rpc_addr, &peer.api_addr, true)
                    .await
                {
                    Ok(()) => log::info!("  Peer {} added", peer.node_id),
                    Err(e) => log::error!("  Failed to add peer {}: {}", peer.node_id, e),
                }
            }
        }

        Ok(())
    }

    /// Add a node to the cluster, forwarding to the leader when needed.
    ///
    /// The node first joins as a learner and catches up; voters are then
    /// promoted through a joint configuration change.
    pub async fn add_node(
        &self,
        name: &str,
        rpc_addr: &str,
        api_addr: &str,
        voter: bool,
    ) -> Result<(), RaftError> {
        if self.is_leader() {
            return self.add_node_local(name, rpc_addr, api_addr, voter).await;
        }

        let request = AddNodeRequest {
            name: name.to_string(),
            rpc_addr: rpc_addr.to_string(),
            api_addr: api_addr.to_string(),
            voter,
        };
        self.meta
            .forward(RpcType::AddNode, encode(&request)?, self.config.propose_timeout)
            .await
            .map(|_| ())
    }

    async fn add_node_local(
        &self,
        name: &str,
        rpc_addr: &str,
        api_addr: &str,
        voter: bool,
    ) -> Result<(), RaftError> {
        let raft_id = raft_id_for(name);
        if let Some(existing) = self.meta.member_node(raft_id) {
            if existing.name != name {
                return Err(RaftError::Membership(format!(
                    "node '{}' collides with member '{}' (raft id {})",
                    name, existing.name, raft_id
                )));
            }
            let is_voter = self.meta.voter_ids().contains(&raft_id);
            if existing.rpc_addr == rpc_addr && is_voter == voter {
                log::debug!("[CLUSTER] Node {} already a member, nothing to do", name);
                return Ok(());
            }
        }

        log::info!(
            "[CLUSTER] Node {} joining (rpc={}, api={}, voter={})",
            name,
            rpc_addr,
            api_addr,
            voter
        );
        let node = StrataNode::new(name, rpc_addr, api_addr);
        self.meta.add_learner(raft_id, node).await?;
        if voter {
            self.meta.add_voters(BTreeSet::from([raft_id])).await?;
        }
        log::info!("[CLUSTER] Node {} joined", name);
        Ok(())
    }

    /// Remove a node from the cluster, forwarding to the leader when needed.
    ///
    /// Shards the node owned keep their assignment.
    pub async fn remove_node(&self, name: &str) -> Result<(), RaftError> {
        if self.is_leader() {
            return self.remove_node_local(name).await;
        }

        let request = RemoveNodeRequest {
            name: name.to_string(),
        };
        self.meta
            .forward(RpcType::RemoveNode, encode(&request)?, self.config.propose_timeout)
            .await
            .map(|_| ())
    }

    async fn remove_node_local(&self, name: &str) -> Result<(), RaftError> {
        let raft_id = raft_id_for(name);
        match self.meta.member_node(raft_id) {
            Some(node) if node.name == name => {
                log::info!("[CLUSTER] Removing node {}", name);
                self.meta.remove_member(raft_id).await
            }
            _ => {
                log::debug!("[CLUSTER] Node {} is not a member, nothing to remove", name);
                Ok(())
            }
        }
    }

    /// Propose a schema command, forwarding to the leader when needed
    pub async fn propose(&self, command: &MetaCommand) -> Result<MetaResponse, RaftError> {
        let bytes = self.meta.propose_with_forward(encode(command)?).await?;
        decode(&bytes)
    }

    /// Projection after a linearizable read barrier
    pub async fn linearizable_state(&self) -> Result<Arc<SchemaState>, RaftError> {
        self.meta.linearizable_barrier().await?;
        Ok(self.state_machine.current())
    }

    /// Projection as currently applied on this node; may lag the leader
    pub fn local_state(&self) -> Arc<SchemaState> {
        self.state_machine.current()
    }

    pub fn stats(&self) -> ClusterStats {
        let mut stats = self.meta.stats(self.node_id.as_str(), self.raft_id);
        stats.applied_entries = self.state_machine.applied_entries();
        stats.rejected_entries = self.state_machine.rejected_entries();
        stats
    }

    // === Raft RPC Handlers (for receiving RPCs from other nodes) ===

    fn raft_instance(&self) -> Result<RaftInstance, RaftError> {
        self.meta
            .raft()
            .ok_or_else(|| RaftError::NotStarted(format!("Group {} not started", META_GROUP)))
    }

    /// Handle incoming vote request
    pub async fn handle_vote(&self, payload: &[u8]) -> Result<Vec<u8>, RaftError> {
        let raft = self.raft_instance()?;
        let request: VoteRequest<u64> = decode(payload)?;

        let response = raft
            .vote(request)
            .await
            .map_err(|e| RaftError::Internal(format!("Vote RPC failed: {:?}", e)))?;

        encode(&response)
    }

    /// Handle incoming append entries request
    pub async fn handle_append_entries(&self, payload: &[u8]) -> Result<Vec<u8>, RaftError> {
        let raft = self.raft_instance()?;
        let request: AppendEntriesRequest<StrataTypeConfig> = decode(payload)?;

        let response = raft
            .append_entries(request)
            .await
            .map_err(|e| RaftError::Internal(format!("AppendEntries RPC failed: {:?}", e)))?;

        encode(&response)
    }

    /// Handle incoming install snapshot request
    pub async fn handle_install_snapshot(&self, payload: &[u8]) -> Result<Vec<u8>, RaftError> {
        let raft = self.raft_instance()?;
        let request: InstallSnapshotRequest<StrataTypeConfig> = decode(payload)?;

        let response = raft
            .install_snapshot(request)
            .await
            .map_err(|e| RaftError::Internal(format!("InstallSnapshot RPC failed: {:?}", e)))?;

        encode(&response)
    }

    /// Handle a proposal forwarded by a follower. Never forwards again.
    pub async fn handle_client_write(&self, payload: &[u8]) -> Result<Vec<u8>, RaftError> {
        self.meta.propose(payload.to_vec()).await
    }

    /// Handle a follower's read index request
    pub async fn handle_read_index(&self) -> Result<Vec<u8>, RaftError> {
        let index = self.meta.read_index().await?;
        encode(&ReadIndexResponse { index })
    }

    /// Handle a forwarded join
    pub async fn handle_add_node(&self, payload: &[u8]) -> Result<Vec<u8>, RaftError> {
        if !self.is_leader() {
            return Err(RaftError::not_leader(self.current_leader()));
        }
        let request: AddNodeRequest = decode(payload)?;
        self.add_node_local(
            &request.name,
            &request.rpc_addr,
            &request.api_addr,
            request.voter,
        )
        .await?;
        Ok(Vec::new())
    }

    /// Handle a forwarded removal
    pub async fn handle_remove_node(&self, payload: &[u8]) -> Result<Vec<u8>, RaftError> {
        if !self.is_leader() {
            return Err(RaftError::not_leader(self.current_leader()));
        }
        let request: RemoveNodeRequest = decode(payload)?;
        self.remove_node_local(&request.name).await?;
        Ok(Vec::new())
    }

    /// Stop the meta group
    pub async fn shutdown(&self) -> Result<(), RaftError> {
        if !self.is_started() {
            log::warn!("RaftManager not started, nothing to shutdown");
            return Ok(());
        }

        log::info!("[CLUSTER] Node {} leaving cluster...", self.node_id);
        self.meta.shutdown().await?;
        *self.started.write() = false;
        log::info!("[CLUSTER] Node {} stopped", self.node_id);
        Ok(())
    }
}
