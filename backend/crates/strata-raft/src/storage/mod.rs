//! openraft storage for the meta group
//!
//! - [`StrataTypeConfig`]: openraft type configuration
//! - [`StrataRaftStorage`]: combined log + state machine storage (v1 API),
//!   split into log store and state machine by `openraft::storage::Adaptor`

mod raft_store;
mod types;

pub use raft_store::{StoredSnapshot, StrataRaftStorage};
pub use types::{StrataNode, StrataTypeConfig};
