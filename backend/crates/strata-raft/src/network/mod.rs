//! Raft Network Layer
//!
//! gRPC-based networking between cluster nodes.
//!
//! ## Components
//!
//! - [`RaftNetwork`]: openraft transport to a single peer
//! - [`RaftNetworkFactory`]: Creates transports and caches channels
//! - [`RaftService`]: gRPC service for incoming Raft and forwarding RPCs

mod models;
mod network;
mod service;

pub use models::{AddNodeRequest, ReadIndexResponse, RemoveNodeRequest, RpcType};
pub use network::{RaftNetwork, RaftNetworkFactory};
pub use service::{call_remote, start_rpc_server, RaftRpcRequest, RaftRpcResponse, RaftService};
