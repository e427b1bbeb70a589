use super::{InvertedIndexConfig, Property, VectorConfig, VectorIndexConfig};
use crate::constants::DEFAULT_VIRTUAL_PER_PHYSICAL;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named collection definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Vectorizer module name, opaque to the schema layer.
    #[serde(default)]
    pub vectorizer: Option<String>,
    #[serde(default)]
    pub vector_index_config: Option<VectorIndexConfig>,
    /// Named vector spaces, keyed by vector name.
    #[serde(default)]
    pub vector_config: BTreeMap<String, VectorConfig>,
    #[serde(default)]
    pub inverted_index_config: Option<InvertedIndexConfig>,
    #[serde(default)]
    pub replication_config: Option<ReplicationConfig>,
    #[serde(default)]
    pub multi_tenancy_config: Option<MultiTenancyConfig>,
    #[serde(default)]
    pub sharding_config: Option<ShardingConfig>,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_multi_tenancy(mut self, enabled: bool) -> Self {
        self.multi_tenancy_config = Some(MultiTenancyConfig { enabled });
        self
    }

    pub fn with_replication_factor(mut self, factor: u32) -> Self {
        self.replication_config = Some(ReplicationConfig { factor });
        self
    }

    /// Exact-name property lookup.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    /// Case-insensitive property lookup, used for collision checks.
    pub fn property_ignore_case(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn multi_tenancy_enabled(&self) -> bool {
        self.multi_tenancy_config.map(|c| c.enabled).unwrap_or(false)
    }

    /// Replication factor, `1` when unset.
    pub fn replication_factor(&self) -> u32 {
        self.replication_config.map(|c| c.factor).unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    pub factor: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self { factor: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MultiTenancyConfig {
    pub enabled: bool,
}

/// Partitioning parameters for classes without multi-tenancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingConfig {
    pub virtual_per_physical: u32,
    /// Number of physical shards; `0` means one per live node.
    pub desired_count: u32,
    pub key: String,
    pub strategy: String,
    pub function: String,
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            virtual_per_physical: DEFAULT_VIRTUAL_PER_PHYSICAL,
            desired_count: 0,
            key: "_id".to_string(),
            strategy: "hash".to_string(),
            function: "xxhash64".to_string(),
        }
    }
}

/// Read-only view of every class.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub classes: Vec<Class>,
}

impl Schema {
    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_defaults() {
        let class = Class::new("Article");
        assert_eq!(class.replication_factor(), 1);
        assert!(!class.multi_tenancy_enabled());
        assert!(class.properties.is_empty());
    }

    #[test]
    fn test_property_lookup() {
        let class = Class::new("Article").with_property(Property::new("tags", vec!["text"]));
        assert!(class.property("tags").is_some());
        assert!(class.property("Tags").is_none());
        assert!(class.property_ignore_case("Tags").is_some());
    }

    #[test]
    fn test_class_survives_bincode() {
        let class = Class::new("Article")
            .with_multi_tenancy(true)
            .with_replication_factor(3)
            .with_property(Property::new("title", vec!["text"]));
        let bytes = bincode::serde::encode_to_vec(&class, bincode::config::standard()).unwrap();
        let (decoded, _): (Class, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
        assert_eq!(decoded, class);
    }
}
