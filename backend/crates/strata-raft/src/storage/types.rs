//! OpenRaft Type Configuration
//!
//! Type configuration for Strata's Raft implementation, used throughout the
//! Raft layer for node identification, log entries and snapshot data.

use std::io::Cursor;

use openraft::{Entry, RaftTypeConfig};
use serde::{Deserialize, Serialize};

/// Type configuration for Strata Raft
///
/// - `D`: Log entry data (serialized [`crate::MetaCommand`])
/// - `R`: Response data (serialized [`crate::MetaResponse`])
/// - `NodeId`: Numeric id derived from the node name
/// - `Node`: Node metadata for cluster membership
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct StrataTypeConfig;

impl RaftTypeConfig for StrataTypeConfig {
    type D = Vec<u8>;
    type R = Vec<u8>;
    type NodeId = u64;
    type Node = StrataNode;
    type Entry = Entry<Self>;
    type SnapshotData = Cursor<Vec<u8>>;
    type AsyncRuntime = openraft::TokioRuntime;
    type Responder = openraft::impls::OneshotResponder<Self>;
}

/// Node information carried in membership entries
///
/// **Important**: Do NOT use `skip_serializing_if` on any fields!
/// Bincode is a non-self-describing format that requires all fields to be present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StrataNode {
    /// Stable node name (the placement identity)
    pub name: String,
    /// gRPC address for Raft communication (e.g., "10.0.0.2:8300")
    pub rpc_addr: String,
    /// Client-facing address (e.g., "10.0.0.2:8080")
    pub api_addr: String,
}

impl StrataNode {
    pub fn new(
        name: impl Into<String>,
        rpc_addr: impl Into<String>,
        api_addr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            rpc_addr: rpc_addr.into(),
            api_addr: api_addr.into(),
        }
    }
}

impl std::fmt::Display for StrataNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.rpc_addr)
    }
}
