//! Payloads of the forwarding RPCs.
//!
//! Raft RPC payloads are openraft's own request/response types. The types
//! here are used when a follower forwards work to the leader. All of them
//! travel bincode-encoded inside `RaftRpcRequest.payload`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RPC kinds understood by [`super::RaftService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcType {
    Vote,
    AppendEntries,
    InstallSnapshot,
    /// Forwarded proposal; payload is an encoded `MetaCommand`
    ClientWrite,
    /// Leader confirms leadership and returns its read index
    ReadIndex,
    AddNode,
    RemoveNode,
}

impl RpcType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcType::Vote => "vote",
            RpcType::AppendEntries => "append_entries",
            RpcType::InstallSnapshot => "install_snapshot",
            RpcType::ClientWrite => "client_write",
            RpcType::ReadIndex => "read_index",
            RpcType::AddNode => "add_node",
            RpcType::RemoveNode => "remove_node",
        }
    }
}

impl fmt::Display for RpcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RpcType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vote" => Ok(RpcType::Vote),
            "append_entries" => Ok(RpcType::AppendEntries),
            "install_snapshot" => Ok(RpcType::InstallSnapshot),
            "client_write" => Ok(RpcType::ClientWrite),
            "read_index" => Ok(RpcType::ReadIndex),
            "add_node" => Ok(RpcType::AddNode),
            "remove_node" => Ok(RpcType::RemoveNode),
            other => Err(format!("Unknown RPC type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadIndexResponse {
    pub index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddNodeRequest {
    pub name: String,
    pub rpc_addr: String,
    pub api_addr: String,
    pub voter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveNodeRequest {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_type_names() {
        for t in [
            RpcType::Vote,
            RpcType::AppendEntries,
            RpcType::InstallSnapshot,
            RpcType::ClientWrite,
            RpcType::ReadIndex,
            RpcType::AddNode,
            RpcType::RemoveNode,
        ] {
            assert_eq!(t.as_str().parse::<RpcType>().unwrap(), t);
        }
        assert!("gossip".parse::<RpcType>().is_err());
    }
}
