use super::types::{ClusterConfig, LoggingSettings, NodeSettings, SchemaSettings};
use crate::constants::{
    DEFAULT_API_PORT, DEFAULT_DATA_TYPE, DEFAULT_RAFT_PORT, DEFAULT_VIRTUAL_PER_PHYSICAL,
};
use std::collections::HashMap;

// Default value functions for serde

pub(super) fn default_node_name() -> String {
    "node1".to_string()
}

pub(super) fn default_api_addr() -> String {
    format!("0.0.0.0:{}", DEFAULT_API_PORT)
}

pub(super) fn default_cluster_id() -> String {
    "strata".to_string()
}

pub(super) fn default_rpc_addr() -> String {
    format!("0.0.0.0:{}", DEFAULT_RAFT_PORT)
}

pub(super) fn default_heartbeat_interval_ms() -> u64 {
    250
}

pub(super) fn default_election_timeout_ms() -> (u64, u64) {
    (500, 1000)
}

pub(super) fn default_propose_timeout_ms() -> u64 {
    5000
}

pub(super) fn default_read_timeout_ms() -> u64 {
    3000
}

pub(super) fn default_snapshot_logs_since_last() -> u64 {
    1000
}

pub(super) fn default_replication_factor() -> u32 {
    1
}

pub(super) fn default_data_type() -> String {
    DEFAULT_DATA_TYPE.to_string()
}

pub(super) fn default_virtual_per_physical() -> u32 {
    DEFAULT_VIRTUAL_PER_PHYSICAL
}

pub(super) fn default_max_tenants_per_request() -> usize {
    10_000
}

pub(super) fn default_max_shards_per_class() -> u32 {
    1024
}

pub(super) fn default_max_virtual_per_physical() -> u32 {
    1024
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_log_format() -> String {
    "compact".to_string()
}

pub(super) fn default_logs_path() -> String {
    "./logs".to_string()
}

pub(super) fn default_true() -> bool {
    true
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            api_addr: default_api_addr(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_id: default_cluster_id(),
            rpc_addr: default_rpc_addr(),
            bootstrap: false,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            election_timeout_ms: default_election_timeout_ms(),
            propose_timeout_ms: default_propose_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            snapshot_logs_since_last: default_snapshot_logs_since_last(),
            peers: Vec::new(),
        }
    }
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            default_replication_factor: default_replication_factor(),
            default_data_type: default_data_type(),
            virtual_per_physical: default_virtual_per_physical(),
            max_tenants_per_request: default_max_tenants_per_request(),
            max_shards_per_class: default_max_shards_per_class(),
            max_virtual_per_physical: default_max_virtual_per_physical(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            logs_path: default_logs_path(),
            log_to_console: true,
            targets: HashMap::new(),
        }
    }
}
