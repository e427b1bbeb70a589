//! RaftExecutor - Cluster mode executor using Raft consensus
//!
//! Routes records through the meta group leader, waits for them to commit
//! and apply, then returns the apply outcome.

use std::sync::Arc;

use async_trait::async_trait;
use strata_commons::models::NodeId;

use crate::cluster_types::ClusterStats;
use crate::commands::{MetaCommand, MetaResponse};
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::manager::RaftManager;
use crate::state_machine::SchemaState;

#[derive(Debug)]
pub struct RaftExecutor {
    manager: Arc<RaftManager>,
}

impl RaftExecutor {
    pub fn new(manager: Arc<RaftManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<RaftManager> {
        &self.manager
    }
}

#[async_trait]
impl CommandExecutor for RaftExecutor {
    async fn execute_meta(&self, cmd: MetaCommand) -> Result<MetaResponse> {
        let kind = cmd.kind();
        let response = self.manager.propose(&cmd).await?;
        log::debug!("RaftExecutor: {} -> {:?}", kind, response);

        // A forwarded proposal is applied on the leader first; make sure the
        // local projection caught up before the caller reads it.
        if !self.manager.is_leader() {
            if let Some(version) = response.version() {
                self.manager
                    .state_machine()
                    .wait_applied(version, self.manager.config().read_timeout)
                    .await?;
            }
        }
        Ok(response)
    }

    async fn join_node(
        &self,
        name: &str,
        rpc_addr: &str,
        api_addr: &str,
        voter: bool,
    ) -> Result<()> {
        self.manager.add_node(name, rpc_addr, api_addr, voter).await
    }

    async fn remove_node(&self, name: &str) -> Result<()> {
        self.manager.remove_node(name).await
    }

    async fn linearizable_state(&self) -> Result<Arc<SchemaState>> {
        self.manager.linearizable_state().await
    }

    fn local_state(&self) -> Arc<SchemaState> {
        self.manager.local_state()
    }

    fn is_leader(&self) -> bool {
        self.manager.is_leader()
    }

    fn node_id(&self) -> &NodeId {
        self.manager.node_id()
    }

    fn is_cluster_mode(&self) -> bool {
        true
    }

    fn stats(&self) -> ClusterStats {
        self.manager.stats()
    }
}
