//! Server configuration parsed from `server.toml`.

mod defaults;
mod loader;
mod types;

pub use types::{
    AuthorizationSettings, ClusterConfig, LoggingSettings, NodeSettings, PeerConfig,
    SchemaSettings, ServerConfig,
};
