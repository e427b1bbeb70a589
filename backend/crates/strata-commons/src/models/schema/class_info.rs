use super::{MultiTenancyConfig, ShardStatus};
use serde::{Deserialize, Serialize};

/// Summary of a class for callers that do not need the full definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassInfo {
    pub exists: bool,
    pub multi_tenancy: MultiTenancyConfig,
    pub replication_factor: u32,
    pub tenants: usize,
    pub properties: usize,
    /// Log index of the last mutation touching the class.
    pub class_version: u64,
    /// Log index of the last mutation touching the class's sharding state.
    pub shard_version: u64,
}

/// One row of `GetShardsStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStatusInfo {
    pub name: String,
    pub status: ShardStatus,
}
