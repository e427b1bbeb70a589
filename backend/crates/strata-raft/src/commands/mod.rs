//! Mutation records replicated through the meta Raft group.

mod meta;

pub use meta::{MetaCommand, MetaResponse, RejectionKind, TenantPlacement};
