//! Individual Raft Group
//!
//! Wraps one openraft instance with its combined storage and network, and
//! adds the two client-facing paths on top of it: proposals that forward to
//! the leader, and the linearizable read barrier.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use openraft::error::{Fatal, RaftError as OpenRaftError};
use openraft::storage::Adaptor;
use openraft::{ChangeMembers, Config, Raft, RaftMetrics, SnapshotPolicy};
use parking_lot::RwLock;

use crate::cluster_types::{ClusterStats, ServerStateExt};
use crate::manager::RaftManagerConfig;
use crate::network::{call_remote, RaftNetworkFactory, ReadIndexResponse, RpcType};
use crate::state_machine::{decode, StrataStateMachine};
use crate::storage::{StrataNode, StrataRaftStorage, StrataTypeConfig};
use crate::RaftError;

/// Type alias for the openraft Raft instance
pub type RaftInstance = Raft<StrataTypeConfig>;

/// Type alias for the storage adaptor
pub type StorageAdaptor<SM> = Adaptor<StrataTypeConfig, Arc<StrataRaftStorage<SM>>>;

const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF_MS: u64 = 50;

/// Map an openraft API error, turning `ForwardToLeader` into a typed hint
fn map_openraft_error<E>(
    err: OpenRaftError<u64, E>,
    wrap: fn(String) -> RaftError,
) -> RaftError
where
    E: std::error::Error + openraft::TryAsRef<openraft::error::ForwardToLeader<u64, StrataNode>>,
{
    if let Some(fwd) = err.forward_to_leader::<StrataNode>() {
        return RaftError::not_leader(fwd.leader_id);
    }
    match err {
        OpenRaftError::Fatal(Fatal::Stopped) => RaftError::Shutdown,
        other => wrap(other.to_string()),
    }
}

/// Errors worth another attempt against a possibly different leader.
///
/// Timeouts are excluded: the proposal may still commit.
fn should_retry(err: &RaftError) -> bool {
    matches!(err, RaftError::NotLeader { .. } | RaftError::Network(_))
}

/// A single Raft consensus group
pub struct RaftGroup<SM: StrataStateMachine> {
    /// Group name, for logs
    name: &'static str,

    /// The Raft instance
    raft: RwLock<Option<RaftInstance>>,

    /// Combined storage for this group
    storage: Arc<StrataRaftStorage<SM>>,

    /// Network factory for this group
    network_factory: RaftNetworkFactory,

    propose_timeout: Duration,
    read_timeout: Duration,
}

impl<SM: StrataStateMachine> RaftGroup<SM> {
    /// Create a new Raft group (not yet started)
    pub fn new(name: &'static str, state_machine: Arc<SM>, config: &RaftManagerConfig) -> Self {
        Self {
            name,
            raft: RwLock::new(None),
            storage: Arc::new(StrataRaftStorage::new(state_machine)),
            network_factory: RaftNetworkFactory::new(),
            propose_timeout: config.propose_timeout,
            read_timeout: config.read_timeout,
        }
    }

    /// Start the Raft group with the given node ID
    pub async fn start(&self, node_id: u64, config: &RaftManagerConfig) -> Result<(), RaftError> {
        if self.is_started() {
            return Ok(());
        }

        let raft_config = Config {
            cluster_name: format!("{}-{}", config.cluster_id, self.name),
            election_timeout_min: config.election_timeout_ms.0,
            election_timeout_max: config.election_timeout_ms.1,
            heartbeat_interval: config.heartbeat_interval_ms,
            snapshot_policy: SnapshotPolicy::LogsSinceLast(config.snapshot_logs_since_last),
            ..Default::default()
        };
        let raft_config = Arc::new(
            raft_config
                .validate()
                .map_err(|e| RaftError::Config(e.to_string()))?,
        );

        let (log_store, state_machine): (StorageAdaptor<SM>, StorageAdaptor<SM>) =
            Adaptor::new(self.storage.clone());

        let raft = Raft::new(
            node_id,
            raft_config,
            self.network_factory.clone(),
            log_store,
            state_machine,
        )
        .await
        .map_err(|e| RaftError::Internal(format!("Failed to create Raft: {:?}", e)))?;

        *self.raft.write() = Some(raft);

        log::info!("Started Raft group {} on node {}", self.name, node_id);
        Ok(())
    }

    /// Bootstrap the group with this node as its only voter
    pub async fn initialize(&self, node_id: u64, node: StrataNode) -> Result<(), RaftError> {
        let raft = self.raft_handle()?;

        let mut members = BTreeMap::new();
        members.insert(node_id, node);

        raft.initialize(members)
            .await
            .map_err(|e| RaftError::Internal(format!("Failed to initialize cluster: {:?}", e)))?;

        log::info!("Initialized Raft group {} with node {}", self.name, node_id);
        Ok(())
    }

    /// Whether this node already holds any log or membership
    pub async fn is_initialized(&self) -> Result<bool, RaftError> {
        let raft = self.raft_handle()?;
        raft.is_initialized()
            .await
            .map_err(|e| RaftError::Internal(format!("{:?}", e)))
    }

    /// Add a learner (non-voting member), waiting until it caught up
    pub async fn add_learner(&self, node_id: u64, node: StrataNode) -> Result<(), RaftError> {
        let raft = self.raft_handle()?;
        self.network_factory.register_node(node_id, node.clone());

        raft.add_learner(node_id, node, true)
            .await
            .map_err(|e| map_openraft_error(e, RaftError::Membership))?;
        Ok(())
    }

    /// Promote learners to voters
    pub async fn add_voters(&self, node_ids: BTreeSet<u64>) -> Result<(), RaftError> {
        let raft = self.raft_handle()?;
        raft.change_membership(ChangeMembers::AddVoterIds(node_ids), false)
            .await
            .map_err(|e| map_openraft_error(e, RaftError::Membership))?;
        Ok(())
    }

    /// Remove a node entirely, voter or learner
    pub async fn remove_member(&self, node_id: u64) -> Result<(), RaftError> {
        let raft = self.raft_handle()?;
        let ids = BTreeSet::from([node_id]);

        // retain=false drops a removed voter from the node set as well
        if self.voter_ids().contains(&node_id) {
            raft.change_membership(ChangeMembers::RemoveVoters(ids), false)
                .await
                .map_err(|e| map_openraft_error(e, RaftError::Membership))?;
        } else if self.member_node(node_id).is_some() {
            raft.change_membership(ChangeMembers::RemoveNodes(ids), false)
                .await
                .map_err(|e| map_openraft_error(e, RaftError::Membership))?;
        }

        self.network_factory.unregister_node(node_id);
        Ok(())
    }

    /// Get the Raft instance (if started)
    pub fn raft(&self) -> Option<RaftInstance> {
        self.raft.read().clone()
    }

    fn raft_handle(&self) -> Result<RaftInstance, RaftError> {
        self.raft()
            .ok_or_else(|| RaftError::NotStarted(self.name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check if this group has been started
    pub fn is_started(&self) -> bool {
        self.raft.read().is_some()
    }

    /// Check if this node is the leader for this group
    pub fn is_leader(&self) -> bool {
        match self.metrics() {
            Some(metrics) => metrics.current_leader == Some(metrics.id),
            None => false,
        }
    }

    /// Get the current leader node ID, if known
    pub fn current_leader(&self) -> Option<u64> {
        self.metrics().and_then(|m| m.current_leader)
    }

    /// Get the latest OpenRaft metrics for this group, if started
    pub fn metrics(&self) -> Option<RaftMetrics<u64, StrataNode>> {
        let raft = self.raft.read();
        raft.as_ref().map(|r| r.metrics().borrow().clone())
    }

    /// Voters of the effective membership
    pub fn voter_ids(&self) -> BTreeSet<u64> {
        self.metrics()
            .map(|m| m.membership_config.membership().voter_ids().collect())
            .unwrap_or_default()
    }

    /// Node descriptor from the effective membership
    pub fn member_node(&self, node_id: u64) -> Option<StrataNode> {
        self.metrics().and_then(|m| {
            m.membership_config
                .membership()
                .get_node(&node_id)
                .cloned()
        })
    }

    /// Propose a command on this node, which must be the leader.
    ///
    /// Returns the response data after the command is committed and applied.
    pub async fn propose(&self, command: Vec<u8>) -> Result<Vec<u8>, RaftError> {
        let raft = self.raft_handle()?;

        let response = tokio::time::timeout(self.propose_timeout, raft.client_write(command))
            .await
            .map_err(|_| RaftError::Timeout(self.propose_timeout))?
            .map_err(|e| map_openraft_error(e, RaftError::Proposal))?;

        Ok(response.data)
    }

    /// Propose a command with automatic leader forwarding
    ///
    /// Retries with exponential backoff while the leader is unknown or moving.
    pub async fn propose_with_forward(&self, command: Vec<u8>) -> Result<Vec<u8>, RaftError> {
        let mut last_error = RaftError::not_leader(None);
        for attempt in 0..MAX_RETRIES {
            let result = if self.is_leader() {
                self.propose(command.clone()).await
            } else {
                self.forward(RpcType::ClientWrite, command.clone(), self.propose_timeout)
                    .await
            };

            match result {
                Ok(data) => return Ok(data),
                Err(e) if should_retry(&e) => {
                    log::debug!(
                        "Proposal on group {} failed (attempt {}): {}",
                        self.name,
                        attempt + 1,
                        e
                    );
                    last_error = e;
                }
                Err(e) => return Err(e),
            }

            if attempt + 1 < MAX_RETRIES {
                let backoff = INITIAL_BACKOFF_MS * (1 << attempt);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }
        Err(last_error)
    }

    /// Confirm leadership with a quorum and return the read index.
    ///
    /// Only valid on the leader. When this returns, the local state machine
    /// has applied at least up to the returned index.
    pub async fn read_index(&self) -> Result<u64, RaftError> {
        let raft = self.raft_handle()?;
        let log_id = tokio::time::timeout(self.read_timeout, raft.ensure_linearizable())
            .await
            .map_err(|_| RaftError::Timeout(self.read_timeout))?
            .map_err(|e| map_openraft_error(e, RaftError::Proposal))?;
        Ok(log_id.map(|l| l.index).unwrap_or(0))
    }

    /// Linearizable read barrier.
    ///
    /// The leader confirms its leadership; a follower asks the leader for the
    /// read index and waits until it applied that far locally. Either way,
    /// local reads issued after this observe every write committed before it.
    pub async fn linearizable_barrier(&self) -> Result<u64, RaftError> {
        let mut last_error = RaftError::not_leader(None);
        for attempt in 0..MAX_RETRIES {
            let result = if self.is_leader() {
                self.read_index().await
            } else {
                self.remote_read_index().await
            };

            match result {
                Ok(index) => return Ok(index),
                Err(e) if should_retry(&e) => last_error = e,
                Err(e) => return Err(e),
            }

            if attempt + 1 < MAX_RETRIES {
                let backoff = INITIAL_BACKOFF_MS * (1 << attempt);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }
        Err(last_error)
    }

    async fn remote_read_index(&self) -> Result<u64, RaftError> {
        let bytes = self
            .forward(RpcType::ReadIndex, Vec::new(), self.read_timeout)
            .await?;
        let response: ReadIndexResponse = decode(&bytes)?;

        let raft = self.raft_handle()?;
        raft.wait(Some(self.read_timeout))
            .applied_index_at_least(Some(response.index), "linearizable read")
            .await
            .map_err(|e| match e {
                openraft::metrics::WaitError::Timeout(..) => RaftError::Timeout(self.read_timeout),
                openraft::metrics::WaitError::ShuttingDown => RaftError::Shutdown,
            })?;
        Ok(response.index)
    }

    /// Send an RPC to the current leader
    pub async fn forward(
        &self,
        rpc_type: RpcType,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, RaftError> {
        let leader_id = self
            .current_leader()
            .ok_or_else(|| RaftError::not_leader(None))?;

        if self.network_factory.get_node(leader_id).is_none() {
            let node = self.member_node(leader_id).ok_or_else(|| {
                RaftError::Network(format!(
                    "Unknown leader node {} for group {}",
                    leader_id, self.name
                ))
            })?;
            self.network_factory.register_node(leader_id, node);
        }

        log::debug!(
            "Forwarding {} for group {} to leader {}",
            rpc_type,
            self.name,
            leader_id
        );
        let channel = self.network_factory.channel_for(leader_id)?;
        call_remote(channel, rpc_type, payload, timeout).await
    }

    /// Register a peer node
    pub fn register_peer(&self, node_id: u64, node: StrataNode) {
        self.network_factory.register_node(node_id, node);
    }

    /// Get reference to the storage
    pub fn storage(&self) -> &Arc<StrataRaftStorage<SM>> {
        &self.storage
    }

    /// Get reference to the network factory
    pub fn network_factory(&self) -> &RaftNetworkFactory {
        &self.network_factory
    }

    /// Point-in-time consensus state
    pub fn stats(&self, node_name: &str, raft_id: u64) -> ClusterStats {
        let sm = self.storage.state_machine();
        let mut stats = ClusterStats {
            node_name: node_name.to_string(),
            raft_id,
            state: "shutdown".to_string(),
            current_leader: None,
            current_term: 0,
            last_log_index: None,
            last_applied_index: sm.last_applied_index(),
            voters: 0,
            learners: 0,
            state_size: sm.approximate_size(),
            applied_entries: 0,
            rejected_entries: 0,
        };
        if let Some(m) = self.metrics() {
            let membership = m.membership_config.membership();
            stats.state = m.state.as_str().to_string();
            stats.current_leader = m.current_leader;
            stats.current_term = m.current_term;
            stats.last_log_index = m.last_log_index;
            stats.voters = membership.voter_ids().count();
            stats.learners = membership.learner_ids().count();
        }
        stats
    }

    /// Stop the Raft instance
    pub async fn shutdown(&self) -> Result<(), RaftError> {
        let raft = self.raft.write().take();
        if let Some(raft) = raft {
            raft.shutdown()
                .await
                .map_err(|e| RaftError::Internal(format!("Failed to stop Raft: {:?}", e)))?;
            log::info!("Stopped Raft group {}", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::MetaStateMachine;

    #[test]
    fn test_raft_group_creation() {
        let group = RaftGroup::new(
            "meta",
            Arc::new(MetaStateMachine::new()),
            &RaftManagerConfig::default(),
        );

        assert_eq!(group.name(), "meta");
        assert!(!group.is_started());
        assert!(!group.is_leader());
        assert!(group.voter_ids().is_empty());
    }

    #[tokio::test]
    async fn test_propose_before_start() {
        let group = RaftGroup::new(
            "meta",
            Arc::new(MetaStateMachine::new()),
            &RaftManagerConfig::default(),
        );
        assert!(matches!(
            group.propose(vec![1]).await,
            Err(RaftError::NotStarted(_))
        ));
    }

    #[test]
    fn test_retry_policy() {
        assert!(should_retry(&RaftError::not_leader(Some(1))));
        assert!(should_retry(&RaftError::Network("refused".into())));
        assert!(!should_retry(&RaftError::Timeout(Duration::from_secs(1))));
    }
}
