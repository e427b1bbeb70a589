//! Schema validation
//!
//! Pure functions over class definitions and index configurations. Nothing in
//! here reads cluster state or performs I/O: the same inputs always give the
//! same verdict.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use strata_commons::models::{
    DataTypeKind, InvertedIndexConfig, Property, ShardingConfig, VectorConfig, VectorIndexConfig,
};

use crate::error::{Result, SchemaError};

static CLASS_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][_0-9A-Za-z]*$").expect("class name pattern"));
static PROPERTY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("property name pattern"));
static TENANT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-_]{1,64}$").expect("tenant name pattern"));

const STOPWORD_PRESETS: [&str; 2] = ["en", "none"];

/// Compatibility checks between an existing index configuration and a
/// requested update.
pub trait ConfigValidator: Send + Sync {
    fn validate_vector_index_config_update(
        &self,
        old: &VectorIndexConfig,
        updated: &VectorIndexConfig,
    ) -> Result<()>;

    fn validate_inverted_index_config_update(
        &self,
        old: &InvertedIndexConfig,
        updated: &InvertedIndexConfig,
    ) -> Result<()>;

    /// Per named vector. Named vectors cannot be added or removed.
    fn validate_vector_index_configs_update(
        &self,
        old: &BTreeMap<String, VectorConfig>,
        updated: &BTreeMap<String, VectorConfig>,
    ) -> Result<()> {
        for name in old.keys() {
            if !updated.contains_key(name) {
                return Err(SchemaError::validation(format!(
                    "named vector '{}' cannot be removed",
                    name
                )));
            }
        }
        for (name, new) in updated {
            let Some(current) = old.get(name) else {
                return Err(SchemaError::validation(format!(
                    "named vector '{}' cannot be added to an existing class",
                    name
                )));
            };
            self.validate_vector_index_config_update(
                &current.vector_index_config,
                &new.vector_index_config,
            )
            .map_err(|e| SchemaError::validation(format!("named vector '{}': {}", name, e)))?;
        }
        Ok(())
    }
}

/// Index format rules for the built-in vector and inverted indexes
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl ConfigValidator for DefaultValidator {
    fn validate_vector_index_config_update(
        &self,
        old: &VectorIndexConfig,
        updated: &VectorIndexConfig,
    ) -> Result<()> {
        if old.index_type != updated.index_type {
            return Err(immutable("vector index type", old.index_type, updated.index_type));
        }
        if old.distance != updated.distance {
            return Err(immutable("distance", old.distance, updated.distance));
        }
        // Unset dimensions are fixed by the first vector imported
        if let (Some(old_dims), Some(new_dims)) = (old.dimensions, updated.dimensions) {
            if old_dims != new_dims {
                return Err(immutable("dimensions", old_dims, new_dims));
            }
        }
        if old.dimensions.is_some() && updated.dimensions.is_none() {
            return Err(SchemaError::validation("dimensions cannot be unset"));
        }
        if old.ef_construction != updated.ef_construction {
            return Err(immutable("efConstruction", old.ef_construction, updated.ef_construction));
        }
        if old.max_connections != updated.max_connections {
            return Err(immutable("maxConnections", old.max_connections, updated.max_connections));
        }
        validate_vector_index_config(updated)
    }

    fn validate_inverted_index_config_update(
        &self,
        old: &InvertedIndexConfig,
        updated: &InvertedIndexConfig,
    ) -> Result<()> {
        if old.index_timestamps != updated.index_timestamps {
            return Err(immutable("indexTimestamps", old.index_timestamps, updated.index_timestamps));
        }
        if old.index_null_state != updated.index_null_state {
            return Err(immutable("indexNullState", old.index_null_state, updated.index_null_state));
        }
        if old.index_property_length != updated.index_property_length {
            return Err(immutable(
                "indexPropertyLength",
                old.index_property_length,
                updated.index_property_length,
            ));
        }
        validate_inverted_index_config(updated)
    }
}

fn immutable(field: &str, old: impl std::fmt::Display, new: impl std::fmt::Display) -> SchemaError {
    SchemaError::validation(format!(
        "{} is immutable: attempted change from \"{}\" to \"{}\"",
        field, old, new
    ))
}

// =============================================================================
// Names
// =============================================================================

/// Upper-case the first letter: `article` becomes `Article`
pub fn normalize_class_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-case the first letter: `Title` becomes `title`
pub fn normalize_property_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn validate_class_name(name: &str) -> Result<()> {
    if !CLASS_NAME.is_match(name) {
        return Err(SchemaError::validation(format!(
            "'{}' is not a valid class name",
            name
        )));
    }
    Ok(())
}

pub fn validate_property_name(name: &str) -> Result<()> {
    if !PROPERTY_NAME.is_match(name) {
        return Err(SchemaError::validation(format!(
            "'{}' is not a valid property name",
            name
        )));
    }
    Ok(())
}

pub fn validate_tenant_name(name: &str) -> Result<()> {
    if !TENANT_NAME.is_match(name) {
        return Err(SchemaError::validation(format!(
            "'{}' is not a valid tenant name",
            name
        )));
    }
    Ok(())
}

// =============================================================================
// Properties
// =============================================================================

/// Validate a list of sibling properties.
///
/// `class_exists` answers whether a cross-reference target exists. The class
/// being defined counts as existing.
pub fn validate_properties(
    class_name: &str,
    properties: &[Property],
    class_exists: &dyn Fn(&str) -> bool,
) -> Result<()> {
    let mut seen = HashSet::new();
    for property in properties {
        if !seen.insert(property.name.to_ascii_lowercase()) {
            return Err(SchemaError::AlreadyExists(format!(
                "property '{}' is defined more than once in class '{}'",
                property.name, class_name
            )));
        }
        validate_property(class_name, property, class_exists)?;
    }
    Ok(())
}

/// Validate one property: name, data types and nesting.
pub fn validate_property(
    class_name: &str,
    property: &Property,
    class_exists: &dyn Fn(&str) -> bool,
) -> Result<()> {
    validate_property_name(&property.name)?;

    if property.data_type.is_empty() {
        return Err(SchemaError::validation(format!(
            "property '{}' has no data type",
            property.name
        )));
    }

    let mut nested = false;
    for tag in &property.data_type {
        let kind = DataTypeKind::parse(tag).map_err(|e| {
            SchemaError::validation(format!("property '{}': {}", property.name, e))
        })?;
        match kind {
            DataTypeKind::Primitive(dt) => nested |= dt.is_nested(),
            DataTypeKind::Reference(target) => {
                if target != class_name && !class_exists(&target) {
                    return Err(SchemaError::validation(format!(
                        "property '{}' references unknown class '{}'",
                        property.name, target
                    )));
                }
            }
        }
    }

    if nested && property.nested_properties.is_empty() {
        return Err(SchemaError::validation(format!(
            "property '{}' of type {:?} requires nested properties",
            property.name, property.data_type
        )));
    }
    if !nested && !property.nested_properties.is_empty() {
        return Err(SchemaError::validation(format!(
            "property '{}' of type {:?} cannot have nested properties",
            property.name, property.data_type
        )));
    }

    if nested {
        let mut seen = HashSet::new();
        for child in &property.nested_properties {
            if !seen.insert(child.name.to_ascii_lowercase()) {
                return Err(SchemaError::AlreadyExists(format!(
                    "nested property '{}' is defined more than once in '{}'",
                    child.name, property.name
                )));
            }
            // Nested properties never reference classes
            validate_property("", child, &no_classes)?;
        }
    }
    Ok(())
}

fn no_classes(_: &str) -> bool {
    false
}

// =============================================================================
// Index configs
// =============================================================================

pub fn validate_inverted_index_config(config: &InvertedIndexConfig) -> Result<()> {
    let bm25 = &config.bm25;
    if !(bm25.k1 >= 0.0) {
        return Err(SchemaError::validation(format!(
            "BM25.k1 must be >= 0, got {}",
            bm25.k1
        )));
    }
    if !(0.0..=1.0).contains(&bm25.b) {
        return Err(SchemaError::validation(format!(
            "BM25.b must be <= 1 and >= 0, got {}",
            bm25.b
        )));
    }

    let stopwords = &config.stopwords;
    if !STOPWORD_PRESETS.contains(&stopwords.preset.as_str()) {
        return Err(SchemaError::validation(format!(
            "stopwordPreset '{}' does not exist",
            stopwords.preset
        )));
    }
    for word in &stopwords.additions {
        if stopwords.removals.contains(word) {
            return Err(SchemaError::validation(format!(
                "found '{}' in both stopwords.additions and stopwords.removals",
                word
            )));
        }
    }
    Ok(())
}

/// Shard counts a class may ask for. Zero means "pick a default".
pub fn validate_sharding_config(
    config: &ShardingConfig,
    max_shards: u32,
    max_virtual_per_physical: u32,
) -> Result<()> {
    if config.desired_count > max_shards {
        return Err(SchemaError::validation(format!(
            "sharding desired_count {} exceeds the limit of {}",
            config.desired_count, max_shards
        )));
    }
    if config.virtual_per_physical > max_virtual_per_physical {
        return Err(SchemaError::validation(format!(
            "sharding virtual_per_physical {} exceeds the limit of {}",
            config.virtual_per_physical, max_virtual_per_physical
        )));
    }
    Ok(())
}

pub fn validate_vector_index_config(config: &VectorIndexConfig) -> Result<()> {
    if config.ef < -1 {
        return Err(SchemaError::validation("ef must be -1 (dynamic) or positive"));
    }
    if config.ef_construction == 0 {
        return Err(SchemaError::validation("efConstruction must be positive"));
    }
    if config.max_connections == 0 {
        return Err(SchemaError::validation("maxConnections must be positive"));
    }
    if config.dynamic_ef_min > config.dynamic_ef_max {
        return Err(SchemaError::validation(format!(
            "dynamicEfMin ({}) must not exceed dynamicEfMax ({})",
            config.dynamic_ef_min, config.dynamic_ef_max
        )));
    }
    if config.dimensions == Some(0) {
        return Err(SchemaError::validation("dimensions must be positive"));
    }
    Ok(())
}
