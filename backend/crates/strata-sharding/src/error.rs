use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardingError {
    #[error("no nodes available for shard placement")]
    NoNodes,

    #[error("replication factor {factor} exceeds available nodes ({available})")]
    NotEnoughNodes { factor: u32, available: usize },

    #[error("replication factor must be at least 1")]
    ZeroReplication,

    #[error("shard '{0}' not found")]
    ShardNotFound(String),

    #[error("shard '{0}' already exists")]
    ShardExists(String),

    #[error("{physical} shards with {virtual_per_physical} virtual shards each exceed the ring limit")]
    RingTooLarge { physical: u64, virtual_per_physical: u64 },

    #[error("partitioning is {0} for this class")]
    Partitioning(&'static str),
}
