//! Strata Commons
//!
//! Shared types used across the Strata schema cluster crates:
//!
//! - **models**: Node identifiers, principals and the schema data model
//!   (classes, properties, index configs, tenants, shard status)
//! - **config**: TOML server configuration with defaults, loading and validation
//! - **constants**: Well-known ports and limits

pub mod config;
pub mod constants;
pub mod models;

pub use config::ServerConfig;
pub use models::{NodeId, Principal};
