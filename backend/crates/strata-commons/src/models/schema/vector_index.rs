use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorIndexType {
    Hnsw,
    Flat,
    Dynamic,
}

impl fmt::Display for VectorIndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VectorIndexType::Hnsw => "hnsw",
            VectorIndexType::Flat => "flat",
            VectorIndexType::Dynamic => "dynamic",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Dot,
    L2Squared,
    Manhattan,
    Hamming,
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Distance::Cosine => "cosine",
            Distance::Dot => "dot",
            Distance::L2Squared => "l2-squared",
            Distance::Manhattan => "manhattan",
            Distance::Hamming => "hamming",
        };
        f.write_str(s)
    }
}

/// Vector index configuration.
///
/// `index_type`, `distance`, `dimensions`, `ef_construction` and
/// `max_connections` are fixed once the index is built. The remaining fields
/// are search/maintenance tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    pub index_type: VectorIndexType,
    pub distance: Distance,
    #[serde(default)]
    pub dimensions: Option<u32>,
    /// `-1` selects dynamic ef.
    pub ef: i32,
    pub ef_construction: u32,
    pub max_connections: u32,
    pub dynamic_ef_min: u32,
    pub dynamic_ef_max: u32,
    pub dynamic_ef_factor: u32,
    pub cleanup_interval_seconds: u32,
    pub vector_cache_max_objects: u64,
    pub flat_search_cutoff: u32,
    pub skip: bool,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            index_type: VectorIndexType::Hnsw,
            distance: Distance::Cosine,
            dimensions: None,
            ef: -1,
            ef_construction: 128,
            max_connections: 32,
            dynamic_ef_min: 100,
            dynamic_ef_max: 500,
            dynamic_ef_factor: 8,
            cleanup_interval_seconds: 300,
            vector_cache_max_objects: 1_000_000_000_000,
            flat_search_cutoff: 40_000,
            skip: false,
        }
    }
}

/// A named vector space.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VectorConfig {
    #[serde(default)]
    pub vectorizer: Option<String>,
    #[serde(default)]
    pub vector_index_config: VectorIndexConfig,
}
