//! Strata Raft Consensus Layer
//!
//! Replicates schema metadata (classes, sharding state, tenants and cluster
//! membership) through a single openraft group and applies it
//! deterministically on every node.
//!
//! ## Key Components
//!
//! - [`MetaCommand`]: Mutation records placed in the replicated log
//! - [`MetaStateMachine`]: Applies committed records to an immutable
//!   [`SchemaState`] projection (copy-on-write, one writer per node)
//! - [`RaftManager`] / [`RaftGroup`]: openraft lifecycle, proposals,
//!   leader forwarding and linearizable reads
//! - [`CommandExecutor`]: Generic seam over cluster ([`RaftExecutor`]) and
//!   standalone ([`DirectExecutor`]) execution
//!
//! ## Usage
//!
//! ```rust,ignore
//! // Standalone / tests:
//! let executor = DirectExecutor::new(NodeId::new("node1"), rpc_addr, api_addr);
//!
//! // Cluster mode:
//! let executor = RaftExecutor::new(raft_manager);
//!
//! // Callers use the same interface:
//! executor.execute_meta(MetaCommand::DeleteClass { class_name }).await?;
//! ```

pub mod cluster_types;
pub mod commands;
pub mod error;
pub mod executor;
pub mod manager;
pub mod network;
pub mod state_machine;
pub mod storage;

pub use cluster_types::{ClusterStats, MemberRole, ServerStateExt};
pub use commands::{MetaCommand, MetaResponse, RejectionKind, TenantPlacement};
pub use error::{RaftError, Result};
pub use executor::{CommandExecutor, DirectExecutor, RaftExecutor};
pub use manager::{PeerNode, RaftGroup, RaftManager, RaftManagerConfig};
pub use network::{start_rpc_server, RaftNetwork, RaftNetworkFactory, RaftService};
pub use state_machine::{
    ApplyResult, ClusterMember, MetaClass, MetaStateMachine, SchemaState, StateMachineSnapshot,
    StrataStateMachine,
};
pub use storage::{StrataNode, StrataRaftStorage, StrataTypeConfig};
