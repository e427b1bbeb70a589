use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopwordConfig {
    pub preset: String,
    #[serde(default)]
    pub additions: Vec<String>,
    #[serde(default)]
    pub removals: Vec<String>,
}

impl Default for StopwordConfig {
    fn default() -> Self {
        Self {
            preset: "en".to_string(),
            additions: Vec::new(),
            removals: Vec::new(),
        }
    }
}

/// Inverted index configuration.
///
/// The `index_*` flags change what is written at import time and cannot be
/// toggled on an existing class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndexConfig {
    pub cleanup_interval_seconds: u32,
    #[serde(default)]
    pub bm25: Bm25Config,
    #[serde(default)]
    pub stopwords: StopwordConfig,
    #[serde(default)]
    pub index_timestamps: bool,
    #[serde(default)]
    pub index_null_state: bool,
    #[serde(default)]
    pub index_property_length: bool,
}

impl Default for InvertedIndexConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_seconds: 60,
            bm25: Bm25Config::default(),
            stopwords: StopwordConfig::default(),
            index_timestamps: false,
            index_null_state: false,
            index_property_length: false,
        }
    }
}
