//! Sharding state for Strata classes.
//!
//! Every node computes identical placement from the same membership snapshot:
//! owners are chosen by rendezvous hashing over the sorted node names, and
//! object keys are routed through a ring of virtual shards keyed by xxHash64.

mod error;
pub mod placement;
mod state;

pub use error::ShardingError;
pub use placement::{rank_nodes, select_owners};
pub use state::{Physical, ShardingState, Virtual, MAX_RING_SLOTS};
