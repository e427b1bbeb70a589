use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete server configuration
///
/// Example server.toml:
/// ```toml
/// [node]
/// name = "node1"
/// api_addr = "0.0.0.0:8080"
///
/// [cluster]
/// cluster_id = "strata"
/// rpc_addr = "0.0.0.0:8300"
/// bootstrap = true
/// heartbeat_interval_ms = 250
/// election_timeout_ms = [500, 1000]
///
/// [[cluster.peers]]
/// name = "node2"
/// rpc_addr = "10.0.0.2:8300"
/// api_addr = "10.0.0.2:8080"
///
/// [schema]
/// default_replication_factor = 1
///
/// [logging]
/// level = "info"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub node: NodeSettings,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub schema: SchemaSettings,
    #[serde(default)]
    pub authorization: AuthorizationSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// `[node]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeSettings {
    /// Stable node name, also the identity used for shard placement
    #[serde(default = "default_node_name")]
    pub name: String,
    /// Address served to clients, advertised to peers
    #[serde(default = "default_api_addr")]
    pub api_addr: String,
}

/// `[cluster]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    #[serde(default = "default_cluster_id")]
    pub cluster_id: String,

    /// Listen address of the consensus RPC server
    #[serde(default = "default_rpc_addr")]
    pub rpc_addr: String,

    /// Initialize a brand new cluster with this node and its configured peers
    #[serde(default)]
    pub bootstrap: bool,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Election timeout range (min, max) in milliseconds
    #[serde(default = "default_election_timeout_ms")]
    pub election_timeout_ms: (u64, u64),

    /// Deadline for a proposal to commit before failing with a timeout
    #[serde(default = "default_propose_timeout_ms")]
    pub propose_timeout_ms: u64,

    /// Deadline for a linearizable read to catch up with the leader
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Number of applied entries between snapshots
    #[serde(default = "default_snapshot_logs_since_last")]
    pub snapshot_logs_since_last: u64,

    /// Static membership directory
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

/// A known peer node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub name: String,
    pub rpc_addr: String,
    #[serde(default)]
    pub api_addr: String,
}

/// `[schema]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaSettings {
    #[serde(default = "default_replication_factor")]
    pub default_replication_factor: u32,
    #[serde(default = "default_data_type")]
    pub default_data_type: String,
    #[serde(default = "default_virtual_per_physical")]
    pub virtual_per_physical: u32,
    #[serde(default = "default_max_tenants_per_request")]
    pub max_tenants_per_request: usize,
    /// Largest `sharding_config.desired_count` a class may request
    #[serde(default = "default_max_shards_per_class")]
    pub max_shards_per_class: u32,
    /// Largest `sharding_config.virtual_per_physical` a class may request
    #[serde(default = "default_max_virtual_per_physical")]
    pub max_virtual_per_physical: u32,
}

/// `[authorization]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthorizationSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Users or groups allowed every verb
    #[serde(default)]
    pub admin_users: Vec<String>,
    /// Users or groups allowed `get` and `list`
    #[serde(default)]
    pub read_only_users: Vec<String>,
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `compact` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_logs_path")]
    pub logs_path: String,
    #[serde(default = "default_true")]
    pub log_to_console: bool,
    /// Per-target level overrides, e.g. `openraft = "info"`
    #[serde(default)]
    pub targets: HashMap<String, String>,
}
