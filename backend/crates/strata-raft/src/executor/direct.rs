//! DirectExecutor - Standalone mode command execution
//!
//! Applies records straight to a local [`MetaStateMachine`] under a single
//! log-index counter. Same apply code as cluster mode, no consensus.

use std::sync::Arc;

use async_trait::async_trait;
use strata_commons::models::NodeId;
use tokio::sync::Mutex;

use crate::cluster_types::ClusterStats;
use crate::commands::{MetaCommand, MetaResponse};
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::state_machine::{
    decode, encode, ClusterMember, MetaStateMachine, SchemaState, StrataStateMachine,
};
use crate::RaftError;

const TERM: u64 = 1;

/// Direct executor for standalone mode and tests.
#[derive(Debug)]
pub struct DirectExecutor {
    node_id: NodeId,
    state_machine: Arc<MetaStateMachine>,
    /// Last index handed out; held across apply so entries stay ordered
    last_index: Mutex<u64>,
}

impl DirectExecutor {
    /// Create an executor whose membership is this node alone
    pub fn new(node_id: NodeId, rpc_addr: impl Into<String>, api_addr: impl Into<String>) -> Self {
        let state_machine = Arc::new(MetaStateMachine::new());
        let me = ClusterMember {
            name: node_id.as_str().to_string(),
            raft_id: node_id.raft_id(),
            rpc_addr: rpc_addr.into(),
            api_addr: api_addr.into(),
            voter: true,
        };
        let last_index = match state_machine.apply_membership(1, TERM, vec![me]) {
            Ok(()) => 1,
            Err(e) => {
                log::error!("DirectExecutor: initial membership failed: {}", e);
                0
            }
        };
        Self {
            node_id,
            state_machine,
            last_index: Mutex::new(last_index),
        }
    }

    pub fn state_machine(&self) -> &Arc<MetaStateMachine> {
        &self.state_machine
    }

    async fn change_members<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<ClusterMember>),
    {
        let mut last = self.last_index.lock().await;
        let mut members: Vec<ClusterMember> =
            self.state_machine.current().members().cloned().collect();
        change(&mut members);

        let index = *last + 1;
        self.state_machine.apply_membership(index, TERM, members)?;
        *last = index;
        Ok(())
    }
}

#[async_trait]
impl CommandExecutor for DirectExecutor {
    async fn execute_meta(&self, cmd: MetaCommand) -> Result<MetaResponse> {
        let bytes = encode(&cmd)?;
        let mut last = self.last_index.lock().await;
        let index = *last + 1;
        let result = self.state_machine.apply(index, TERM, &bytes)?;
        *last = index;
        decode(&result.into_response())
    }

    async fn join_node(
        &self,
        name: &str,
        rpc_addr: &str,
        api_addr: &str,
        voter: bool,
    ) -> Result<()> {
        let raft_id = NodeId::new(name).raft_id();
        if let Some(existing) = self.state_machine.current().member_by_raft_id(raft_id) {
            if existing.name != name {
                return Err(RaftError::Membership(format!(
                    "node '{}' collides with member '{}' (raft id {})",
                    name, existing.name, raft_id
                )));
            }
        }

        let member = ClusterMember {
            name: name.to_string(),
            raft_id,
            rpc_addr: rpc_addr.to_string(),
            api_addr: api_addr.to_string(),
            voter,
        };
        self.change_members(move |members| {
            members.retain(|m| m.name != member.name);
            members.push(member);
        })
        .await
    }

    async fn remove_node(&self, name: &str) -> Result<()> {
        if self.state_machine.current().member(name).is_none() {
            return Ok(());
        }
        self.change_members(|members| members.retain(|m| m.name != name))
            .await
    }

    async fn linearizable_state(&self) -> Result<Arc<SchemaState>> {
        // Every write is applied before execute_meta returns
        Ok(self.state_machine.current())
    }

    fn local_state(&self) -> Arc<SchemaState> {
        self.state_machine.current()
    }

    fn is_leader(&self) -> bool {
        true
    }

    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    fn is_cluster_mode(&self) -> bool {
        false
    }

    fn stats(&self) -> ClusterStats {
        let state = self.state_machine.current();
        let (voters, learners) = state
            .members()
            .fold((0, 0), |(v, l), m| if m.voter { (v + 1, l) } else { (v, l + 1) });
        ClusterStats {
            node_name: self.node_id.as_str().to_string(),
            raft_id: self.node_id.raft_id(),
            state: "leader".to_string(),
            current_leader: Some(self.node_id.raft_id()),
            current_term: TERM,
            last_log_index: Some(self.state_machine.last_applied_index()),
            last_applied_index: self.state_machine.last_applied_index(),
            voters,
            learners,
            state_size: self.state_machine.approximate_size(),
            applied_entries: self.state_machine.applied_entries(),
            rejected_entries: self.state_machine.rejected_entries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_commons::models::Class;
    use strata_sharding::ShardingState;

    fn executor() -> DirectExecutor {
        DirectExecutor::new(NodeId::new("node1"), "127.0.0.1:8300", "127.0.0.1:8080")
    }

    #[tokio::test]
    async fn test_execute_meta_applies_in_order() {
        let executor = executor();
        let response = executor
            .execute_meta(MetaCommand::AddClass {
                class: Class::new("Article"),
                state: ShardingState::partitioned("Article", 1),
            })
            .await
            .unwrap();
        assert_eq!(response, MetaResponse::Applied { version: 2 });

        let state = executor.local_state();
        assert!(state.class("Article").is_some());
        assert_eq!(state.applied_index(), 2);
    }

    #[tokio::test]
    async fn test_membership_changes() {
        let executor = executor();
        assert!(executor.local_state().member("node1").is_some());

        executor
            .join_node("node2", "127.0.0.1:8301", "127.0.0.1:8081", false)
            .await
            .unwrap();
        let stats = executor.stats();
        assert_eq!((stats.voters, stats.learners), (1, 1));

        executor.remove_node("node2").await.unwrap();
        assert!(executor.local_state().member("node2").is_none());

        // unknown node: nothing to do
        executor.remove_node("node9").await.unwrap();
        assert_eq!(executor.stats().last_applied_index, 3);
    }

    #[tokio::test]
    async fn test_rejoin_updates_address() {
        let executor = executor();
        executor
            .join_node("node2", "127.0.0.1:8301", "127.0.0.1:8081", true)
            .await
            .unwrap();
        executor
            .join_node("node2", "127.0.0.1:9301", "127.0.0.1:8081", true)
            .await
            .unwrap();
        let state = executor.local_state();
        assert_eq!(state.members().count(), 2);
        assert_eq!(state.member("node2").unwrap().rpc_addr, "127.0.0.1:9301");
    }
}
