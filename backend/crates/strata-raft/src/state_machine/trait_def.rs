//! StrataStateMachine trait definition
//!
//! The interface between the openraft storage adaptor and a replicated state
//! machine. Apply calls arrive in log order from a single task.

use serde::{Deserialize, Serialize};

use crate::state_machine::ClusterMember;
use crate::RaftError;

/// Result of applying a command to the state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Command applied, with serialized response data
    Ok(Vec<u8>),
    /// Entry was already applied (replay after restart or snapshot install)
    NoOp,
}

impl ApplyResult {
    /// Response bytes handed back to the proposer
    pub fn into_response(self) -> Vec<u8> {
        match self {
            ApplyResult::Ok(data) => data,
            ApplyResult::NoOp => Vec::new(),
        }
    }
}

/// Snapshot data for a state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachineSnapshot {
    /// Last applied log index
    pub last_applied_index: u64,
    /// Last applied log term
    pub last_applied_term: u64,
    /// Serialized state data
    pub data: Vec<u8>,
}

impl StateMachineSnapshot {
    pub fn new(last_applied_index: u64, last_applied_term: u64, data: Vec<u8>) -> Self {
        Self {
            last_applied_index,
            last_applied_term,
            data,
        }
    }
}

/// Replicated state machine driven by the Raft storage adaptor
///
/// Implementations must be deterministic: the same sequence of calls yields
/// bit-identical state on every node. An `Err` from `apply` means the entry
/// could not be interpreted at all; the storage reports it to openraft as a
/// fatal storage error and the local Raft instance stops.
pub trait StrataStateMachine: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Apply a normal log entry
    fn apply(&self, index: u64, term: u64, command: &[u8]) -> Result<ApplyResult, RaftError>;

    /// Apply a committed membership entry
    fn apply_membership(
        &self,
        index: u64,
        term: u64,
        members: Vec<ClusterMember>,
    ) -> Result<(), RaftError>;

    /// Record a log position that carries no command (blank leader entries)
    fn advance(&self, index: u64, term: u64);

    fn last_applied_index(&self) -> u64;

    fn last_applied_term(&self) -> u64;

    /// Serialize the full projection
    fn snapshot(&self) -> Result<StateMachineSnapshot, RaftError>;

    /// Replace the projection with a snapshot
    fn restore(&self, snapshot: StateMachineSnapshot) -> Result<(), RaftError>;

    /// Approximate in-memory size, for diagnostics
    fn approximate_size(&self) -> usize {
        0
    }
}
