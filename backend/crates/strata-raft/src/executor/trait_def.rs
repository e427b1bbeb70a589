use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use strata_commons::models::NodeId;

use crate::cluster_types::ClusterStats;
use crate::commands::{MetaCommand, MetaResponse};
use crate::error::Result;
use crate::state_machine::SchemaState;

/// Commits schema records and membership changes, and serves the projection.
///
/// `execute_meta` returns once the record is applied locally: a read of
/// [`CommandExecutor::local_state`] afterwards observes the write.
#[async_trait]
pub trait CommandExecutor: Send + Sync + Debug {
    /// Commit a schema record and return its apply outcome
    async fn execute_meta(&self, cmd: MetaCommand) -> Result<MetaResponse>;

    /// Add a node to the consensus group
    async fn join_node(&self, name: &str, rpc_addr: &str, api_addr: &str, voter: bool)
        -> Result<()>;

    /// Remove a node from the consensus group
    async fn remove_node(&self, name: &str) -> Result<()>;

    /// Projection reflecting every write committed before this call
    async fn linearizable_state(&self) -> Result<Arc<SchemaState>>;

    /// Projection as applied on this node, without waiting
    fn local_state(&self) -> Arc<SchemaState>;

    fn is_leader(&self) -> bool;

    fn node_id(&self) -> &NodeId;

    fn is_cluster_mode(&self) -> bool;

    fn stats(&self) -> ClusterStats;
}
