//! Schema data model: classes, properties, index configuration, tenants and
//! shard status.
//!
//! These types are replicated through the consensus log, so every field is
//! serialized positionally (bincode). Do not use `skip_serializing_if` on any
//! of them: bincode cannot recover a field that was skipped on the wire.

mod class;
mod class_info;
mod data_type;
mod inverted_index;
mod property;
mod shard_status;
mod tenant;
mod vector_index;

pub use class::{Class, MultiTenancyConfig, ReplicationConfig, Schema, ShardingConfig};
pub use class_info::{ClassInfo, ShardStatusInfo};
pub use data_type::{DataTypeKind, PrimitiveDataType};
pub use inverted_index::{Bm25Config, InvertedIndexConfig, StopwordConfig};
pub use property::{Property, Tokenization};
pub use shard_status::ShardStatus;
pub use tenant::{Tenant, TenantActivityStatus};
pub use vector_index::{Distance, VectorConfig, VectorIndexConfig, VectorIndexType};
