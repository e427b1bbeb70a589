//! Shared models for the Strata schema cluster.

mod node_id;
mod principal;
pub mod schema;

pub use node_id::{raft_id_for, NodeId};
pub use principal::Principal;
pub use schema::{
    Bm25Config, Class, ClassInfo, DataTypeKind, Distance, InvertedIndexConfig,
    MultiTenancyConfig, PrimitiveDataType, Property, ReplicationConfig, Schema, ShardStatus,
    ShardStatusInfo, ShardingConfig, StopwordConfig, Tenant, TenantActivityStatus, Tokenization,
    VectorConfig, VectorIndexConfig, VectorIndexType,
};
