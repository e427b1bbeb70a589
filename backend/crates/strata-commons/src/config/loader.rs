use super::types::ServerConfig;
use crate::models::NodeId;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const VALID_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const VALID_FORMATS: [&str; 2] = ["compact", "json"];

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text, then finalize it.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let mut config: ServerConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;

        config.finalize()?;

        Ok(config)
    }

    /// Normalize names and validate configuration.
    pub fn finalize(&mut self) -> anyhow::Result<()> {
        self.node.name = self.node.name.trim().to_string();
        self.logging.level = self.logging.level.to_ascii_lowercase();
        self.logging.format = self.logging.format.to_ascii_lowercase();
        for peer in &mut self.cluster.peers {
            peer.name = peer.name.trim().to_string();
        }
        // The local node is never its own peer
        let local = self.node.name.clone();
        self.cluster.peers.retain(|p| p.name != local);

        self.validate()?;

        Ok(())
    }

    /// Validate configuration settings
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node.name.is_empty() {
            return Err(anyhow::anyhow!("node.name cannot be empty"));
        }

        if self.cluster.cluster_id.is_empty() {
            return Err(anyhow::anyhow!("cluster_id cannot be empty"));
        }

        let (election_min, election_max) = self.cluster.election_timeout_ms;
        if election_min >= election_max {
            return Err(anyhow::anyhow!(
                "election_timeout_ms min ({}) must be < max ({})",
                election_min,
                election_max
            ));
        }

        if self.cluster.heartbeat_interval_ms == 0
            || self.cluster.heartbeat_interval_ms >= election_min
        {
            return Err(anyhow::anyhow!(
                "heartbeat_interval_ms ({}) must be > 0 and < election timeout min ({})",
                self.cluster.heartbeat_interval_ms,
                election_min
            ));
        }

        if self.cluster.propose_timeout_ms == 0 {
            return Err(anyhow::anyhow!("propose_timeout_ms cannot be 0"));
        }

        if self.cluster.read_timeout_ms == 0 {
            return Err(anyhow::anyhow!("read_timeout_ms cannot be 0"));
        }

        let mut seen = HashSet::new();
        for peer in &self.cluster.peers {
            if peer.name.is_empty() {
                return Err(anyhow::anyhow!("peer name cannot be empty"));
            }
            if !seen.insert(peer.name.as_str()) {
                return Err(anyhow::anyhow!("duplicate peer name '{}'", peer.name));
            }
            if peer.rpc_addr.is_empty() {
                return Err(anyhow::anyhow!("peer '{}' has no rpc_addr", peer.name));
            }
        }

        if self.schema.default_replication_factor == 0 {
            return Err(anyhow::anyhow!("default_replication_factor cannot be 0"));
        }

        if self.schema.virtual_per_physical == 0 {
            return Err(anyhow::anyhow!("virtual_per_physical cannot be 0"));
        }

        if self.schema.max_shards_per_class == 0 || self.schema.max_virtual_per_physical == 0 {
            return Err(anyhow::anyhow!(
                "max_shards_per_class and max_virtual_per_physical cannot be 0"
            ));
        }

        if self.schema.virtual_per_physical > self.schema.max_virtual_per_physical {
            return Err(anyhow::anyhow!(
                "virtual_per_physical ({}) exceeds max_virtual_per_physical ({})",
                self.schema.virtual_per_physical,
                self.schema.max_virtual_per_physical
            ));
        }

        if self.schema.default_data_type.is_empty() {
            return Err(anyhow::anyhow!("default_data_type cannot be empty"));
        }

        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            ));
        }

        if !VALID_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                VALID_FORMATS.join(", ")
            ));
        }

        for (target, level) in &self.logging.targets {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(anyhow::anyhow!(
                    "Invalid log level '{}' for target '{}'. Must be one of: {}",
                    level,
                    target,
                    VALID_LEVELS.join(", ")
                ));
            }
        }

        Ok(())
    }

    /// Identity of the local node.
    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.node.name.clone())
    }

    pub fn is_cluster_mode(&self) -> bool {
        !self.cluster.peers.is_empty() || self.cluster.bootstrap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = ServerConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_election_range_must_be_ordered() {
        let mut config = ServerConfig::default();
        config.cluster.election_timeout_ms = (1000, 500);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_heartbeat_below_election() {
        let mut config = ServerConfig::default();
        config.cluster.heartbeat_interval_ms = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_replication_factor_rejected() {
        let mut config = ServerConfig::default();
        config.schema.default_replication_factor = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_virtual_shards_within_limit() {
        let mut config = ServerConfig::default();
        config.schema.virtual_per_physical = config.schema.max_virtual_per_physical + 1;
        assert!(config.validate().is_err());

        config.schema.virtual_per_physical = 128;
        config.schema.max_shards_per_class = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_with_peers() {
        let config = ServerConfig::from_toml_str(
            r#"
            [node]
            name = "node1"

            [cluster]
            bootstrap = true
            election_timeout_ms = [300, 600]

            [[cluster.peers]]
            name = "node1"
            rpc_addr = "10.0.0.1:8300"

            [[cluster.peers]]
            name = "node2"
            rpc_addr = "10.0.0.2:8300"
            api_addr = "10.0.0.2:8080"
            "#,
        )
        .unwrap();

        assert_eq!(config.cluster.election_timeout_ms, (300, 600));
        // the local node is dropped from its own peer list
        assert_eq!(config.cluster.peers.len(), 1);
        assert_eq!(config.cluster.peers[0].name, "node2");
        assert_eq!(config.schema.default_data_type, "text");
        assert!(config.is_cluster_mode());
    }

    #[test]
    fn test_duplicate_peers_rejected() {
        let result = ServerConfig::from_toml_str(
            r#"
            [[cluster.peers]]
            name = "node2"
            rpc_addr = "10.0.0.2:8300"

            [[cluster.peers]]
            name = "node2"
            rpc_addr = "10.0.0.3:8300"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[node]\nname = \"alpha\"\n[logging]\nlevel = \"DEBUG\"").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.node_id().as_str(), "alpha");
        assert_eq!(config.logging.level, "debug");
    }
}
