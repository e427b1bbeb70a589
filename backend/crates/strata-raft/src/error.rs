//! Error types for the Raft layer

use thiserror::Error;

/// Result type for Raft operations
pub type Result<T> = std::result::Result<T, RaftError>;

/// Errors that can occur in the Raft layer
#[derive(Debug, Error)]
pub enum RaftError {
    /// This node is not the leader; `leader` is the last known leader, if any
    #[error("Not leader: leader is node {leader:?}")]
    NotLeader { leader: Option<u64> },

    /// Raft not started yet
    #[error("Raft not started: {0}")]
    NotStarted(String),

    /// Failed to apply command to state machine
    #[error("Failed to apply command: {0}")]
    ApplyFailed(String),

    /// Failed to serialize/deserialize
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Proposal rejected by the consensus layer
    #[error("Proposal rejected: {0}")]
    Proposal(String),

    /// Membership change rejected by the consensus layer
    #[error("Membership change failed: {0}")]
    Membership(String),

    /// Network error during Raft communication
    #[error("Network error: {0}")]
    Network(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Proposal or read did not complete in time
    #[error("Command timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Raft is shutting down
    #[error("Raft is shutting down")]
    Shutdown,

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RaftError {
    /// Create a NotLeader error
    pub fn not_leader(leader: Option<u64>) -> Self {
        RaftError::NotLeader { leader }
    }

    /// Create an ApplyFailed error
    pub fn apply_failed(msg: impl Into<String>) -> Self {
        RaftError::ApplyFailed(msg.into())
    }

    /// Create a Storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        RaftError::Storage(msg.into())
    }

    /// Returns true if retrying might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RaftError::NotLeader { .. } | RaftError::Timeout(_) | RaftError::Network(_)
        )
    }

    /// Returns the leader hint if this is a NotLeader error
    pub fn leader_hint(&self) -> Option<u64> {
        if let RaftError::NotLeader { leader } = self {
            *leader
        } else {
            None
        }
    }
}

impl From<bincode::error::EncodeError> for RaftError {
    fn from(err: bincode::error::EncodeError) -> Self {
        RaftError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for RaftError {
    fn from(err: bincode::error::DecodeError) -> Self {
        RaftError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RaftError {
    fn from(err: std::io::Error) -> Self {
        RaftError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retryable() {
        assert!(RaftError::not_leader(Some(2)).is_retryable());
        assert!(RaftError::Timeout(Duration::from_millis(10)).is_retryable());
        assert!(!RaftError::Serialization("bad".into()).is_retryable());
    }

    #[test]
    fn test_leader_hint() {
        assert_eq!(RaftError::not_leader(Some(7)).leader_hint(), Some(7));
        assert_eq!(RaftError::Shutdown.leader_hint(), None);
    }
}
