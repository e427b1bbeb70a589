//! Error types for schema operations
//!
//! Validation and authorization failures are detected before a record is
//! proposed. Consensus failures keep their own variants so callers can apply
//! a different retry policy to them.

use strata_raft::{RaftError, RejectionKind};
use strata_sharding::ShardingError;
use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// Class, property, tenant or shard does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate class, property, tenant or node name
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Incompatible change or malformed definition. Never safe to retry
    /// unmodified.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A joining node's address could not be resolved
    #[error("Unreachable: {0}")]
    Unreachable(String),

    /// The proposal did not commit before the deadline. It may still commit.
    #[error("Consensus timeout: {0}")]
    ConsensusTimeout(String),

    /// No leader, not enough voters, or consensus not running on this node
    #[error("Consensus unavailable: {0}")]
    ConsensusUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SchemaError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        SchemaError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        SchemaError::ValidationFailed(msg.into())
    }

    /// Error for a record the state machine rejected at apply time
    pub fn from_rejection(kind: RejectionKind, message: String) -> Self {
        match kind {
            RejectionKind::NotFound => SchemaError::NotFound(message),
            RejectionKind::AlreadyExists => SchemaError::AlreadyExists(message),
            RejectionKind::ValidationFailed => SchemaError::ValidationFailed(message),
        }
    }

    /// True for consensus errors a caller may retry when the request is
    /// idempotent
    pub fn is_consensus(&self) -> bool {
        matches!(
            self,
            SchemaError::ConsensusTimeout(_) | SchemaError::ConsensusUnavailable(_)
        )
    }
}

impl From<RaftError> for SchemaError {
    fn from(err: RaftError) -> Self {
        match err {
            RaftError::Timeout(_) => SchemaError::ConsensusTimeout(err.to_string()),
            RaftError::NotLeader { .. }
            | RaftError::NotStarted(_)
            | RaftError::Network(_)
            | RaftError::Shutdown => SchemaError::ConsensusUnavailable(err.to_string()),
            other => SchemaError::Internal(other.to_string()),
        }
    }
}

impl From<ShardingError> for SchemaError {
    fn from(err: ShardingError) -> Self {
        match err {
            ShardingError::ShardNotFound(_) => SchemaError::NotFound(err.to_string()),
            ShardingError::ShardExists(_) => SchemaError::AlreadyExists(err.to_string()),
            other => SchemaError::ValidationFailed(other.to_string()),
        }
    }
}
