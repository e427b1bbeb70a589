//! Strata Schema
//!
//! Request-facing side of the schema cluster. The [`Handler`] authorizes a
//! request, plans it into a fully resolved mutation record with the
//! [`Parser`] and commits it through a [`strata_raft::CommandExecutor`].
//!
//! - [`validator`]: name, data-type and index-config rules
//! - [`Parser`]: defaults, shard placement and precondition checks
//! - [`Authorizer`]: capability checks on `schema/...` resource paths
//! - [`ClusterState`]: node directory used for placement and joins
//! - [`SchemaError`]: error taxonomy returned to callers

pub mod authorizer;
pub mod cluster_state;
pub mod error;
pub mod handler;
pub mod locks;
pub mod parser;
pub mod validator;

pub use authorizer::{AllowAll, Authorizer, RoleAuthorizer, Verb};
pub use cluster_state::{ClusterState, MemberDirectory};
pub use error::{Result, SchemaError};
pub use handler::Handler;
pub use parser::Parser;
pub use validator::{ConfigValidator, DefaultValidator};
