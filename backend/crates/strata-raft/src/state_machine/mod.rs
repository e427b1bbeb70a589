//! State machines applied on every node
//!
//! - [`MetaStateMachine`]: the schema projection, swapped atomically after
//!   every applied entry
//! - [`SchemaState`]: the immutable projection readers observe

mod meta;
mod schema_state;
mod serde_helpers;
mod trait_def;

pub use meta::MetaStateMachine;
pub use schema_state::{ClusterMember, MetaClass, SchemaState};
pub use serde_helpers::{decode, encode};
pub use trait_def::{ApplyResult, StateMachineSnapshot, StrataStateMachine};
