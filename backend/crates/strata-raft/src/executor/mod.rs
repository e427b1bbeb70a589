//! CommandExecutor trait and implementations
//!
//! The CommandExecutor gives the schema handler one interface for committing
//! records, whether they go through Raft or straight into a local state
//! machine.
//!
//! ```text
//! CLUSTER:    Handler → RaftExecutor → Raft (propose, replicate) → MetaStateMachine
//! STANDALONE: Handler → DirectExecutor → MetaStateMachine
//! ```

mod direct;
mod raft;
mod trait_def;

pub use direct::DirectExecutor;
pub use raft::RaftExecutor;
pub use trait_def::CommandExecutor;
