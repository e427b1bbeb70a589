//! Raft Manager
//!
//! - [`RaftManager`]: Owns the meta group and serves peer RPCs
//! - [`RaftGroup`]: A single Raft consensus group
//! - [`RaftManagerConfig`]: Runtime settings resolved from the server config

mod config;
mod raft_group;
mod raft_manager;

pub use config::{PeerNode, RaftManagerConfig};
pub use raft_group::{RaftGroup, RaftInstance};
pub use raft_manager::RaftManager;
