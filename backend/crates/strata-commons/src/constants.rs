//! Well-known constants shared by the server and cluster crates.

/// Default port for the consensus RPC listener.
///
/// A joining node advertised only by hostname is reached on this port unless
/// the join request names a port explicitly.
pub const DEFAULT_RAFT_PORT: u16 = 8300;

/// Default port for the client-facing API.
pub const DEFAULT_API_PORT: u16 = 8080;

/// Name of the single consensus group replicating schema metadata.
pub const META_GROUP: &str = "meta";

/// Default number of virtual shards owned by each physical shard.
pub const DEFAULT_VIRTUAL_PER_PHYSICAL: u32 = 128;

/// Default primitive type assigned when a property omits one.
pub const DEFAULT_DATA_TYPE: &str = "text";
