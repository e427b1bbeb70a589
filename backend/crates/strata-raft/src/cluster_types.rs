//! Cluster Types
//!
//! Member roles and a point-in-time view of this node's Raft state.

use openraft::ServerState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ServerState has: Leader, Follower, Learner, Candidate, Shutdown
pub use openraft::ServerState as NodeRole;

/// Helper trait to convert ServerState to string
pub trait ServerStateExt {
    /// Convert to lowercase string representation
    fn as_str(&self) -> &'static str;
}

impl ServerStateExt for ServerState {
    fn as_str(&self) -> &'static str {
        match self {
            ServerState::Leader => "leader",
            ServerState::Follower => "follower",
            ServerState::Learner => "learner",
            ServerState::Candidate => "candidate",
            ServerState::Shutdown => "shutdown",
        }
    }
}

/// Role a member holds in the membership configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Counts toward quorum
    #[default]
    Voter,
    /// Receives the log but does not vote
    Learner,
}

impl MemberRole {
    pub fn from_voter(voter: bool) -> Self {
        if voter {
            MemberRole::Voter
        } else {
            MemberRole::Learner
        }
    }

    pub fn is_voter(&self) -> bool {
        matches!(self, MemberRole::Voter)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Voter => "voter",
            MemberRole::Learner => "learner",
        }
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "voter" => Ok(MemberRole::Voter),
            "learner" | "nonvoter" | "non_voter" => Ok(MemberRole::Learner),
            other => Err(format!("Unknown member role: {}", other)),
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of this node's consensus state, for status endpoints and logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub node_name: String,
    pub raft_id: u64,
    /// openraft server state, lowercase
    pub state: String,
    pub current_leader: Option<u64>,
    pub current_term: u64,
    pub last_log_index: Option<u64>,
    pub last_applied_index: u64,
    pub voters: usize,
    pub learners: usize,
    /// Approximate number of objects in the state machine projection
    pub state_size: usize,
    /// Records applied by the state machine, rejected ones excluded
    pub applied_entries: u64,
    pub rejected_entries: u64,
}

impl ClusterStats {
    pub fn is_leader(&self) -> bool {
        self.current_leader == Some(self.raft_id)
    }
}
