//! Schema mutation records
//!
//! Every record is fully resolved before it is proposed: defaults are filled
//! in and sharding layouts are precomputed, so applying a record never needs
//! cluster topology or configuration. Preconditions that a concurrent commit
//! may have invalidated are re-checked at apply time and reported as
//! [`MetaResponse::Rejected`].

use serde::{Deserialize, Serialize};
use std::fmt;
use strata_commons::models::{Class, Property, ShardStatus, Tenant, TenantActivityStatus};
use strata_sharding::ShardingState;

/// Commands for the meta Raft group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaCommand {
    // =========================================================================
    // Class Operations
    // =========================================================================
    /// Create a class with its initial sharding layout
    AddClass { class: Class, state: ShardingState },

    /// Recreate a class from a backup, keeping its recorded sharding layout
    RestoreClass { class: Class, state: ShardingState },

    /// Replace a class's mutable settings. `state` is set when the sharding
    /// layout changed (replication factor growth).
    UpdateClass {
        class_name: String,
        class: Class,
        state: Option<ShardingState>,
    },

    /// Delete a class and its sharding state
    DeleteClass { class_name: String },

    // =========================================================================
    // Property Operations
    // =========================================================================
    /// Append a new property
    AddProperty { class_name: String, property: Property },

    /// Append `data_type` to a property unless already present
    UpdatePropertyDataType {
        class_name: String,
        property_name: String,
        data_type: String,
    },

    // =========================================================================
    // Shard / Tenant Operations
    // =========================================================================
    UpdateShardStatus {
        class_name: String,
        shard_name: String,
        status: ShardStatus,
    },

    /// Add tenant shards with precomputed owners
    AddTenants {
        class_name: String,
        tenants: Vec<TenantPlacement>,
    },

    /// Change tenant activity status
    UpdateTenants { class_name: String, tenants: Vec<Tenant> },

    DeleteTenants { class_name: String, tenants: Vec<String> },
}

impl MetaCommand {
    /// Record kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            MetaCommand::AddClass { .. } => "AddClass",
            MetaCommand::RestoreClass { .. } => "RestoreClass",
            MetaCommand::UpdateClass { .. } => "UpdateClass",
            MetaCommand::DeleteClass { .. } => "DeleteClass",
            MetaCommand::AddProperty { .. } => "AddProperty",
            MetaCommand::UpdatePropertyDataType { .. } => "UpdatePropertyDataType",
            MetaCommand::UpdateShardStatus { .. } => "UpdateShardStatus",
            MetaCommand::AddTenants { .. } => "AddTenants",
            MetaCommand::UpdateTenants { .. } => "UpdateTenants",
            MetaCommand::DeleteTenants { .. } => "DeleteTenants",
        }
    }

    /// Class the record targets
    pub fn class_name(&self) -> &str {
        match self {
            MetaCommand::AddClass { class, .. } | MetaCommand::RestoreClass { class, .. } => {
                &class.name
            }
            MetaCommand::UpdateClass { class_name, .. }
            | MetaCommand::DeleteClass { class_name }
            | MetaCommand::AddProperty { class_name, .. }
            | MetaCommand::UpdatePropertyDataType { class_name, .. }
            | MetaCommand::UpdateShardStatus { class_name, .. }
            | MetaCommand::AddTenants { class_name, .. }
            | MetaCommand::UpdateTenants { class_name, .. }
            | MetaCommand::DeleteTenants { class_name, .. } => class_name,
        }
    }
}

/// A tenant to create, with its replica owners already chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPlacement {
    pub name: String,
    pub status: TenantActivityStatus,
    pub nodes: Vec<String>,
}

/// Why a record was rejected at apply time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionKind {
    NotFound,
    AlreadyExists,
    ValidationFailed,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionKind::NotFound => "not found",
            RejectionKind::AlreadyExists => "already exists",
            RejectionKind::ValidationFailed => "validation failed",
        };
        f.write_str(s)
    }
}

/// Result of applying a [`MetaCommand`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaResponse {
    /// State changed; `version` is the applying log index
    Applied { version: u64 },
    /// Valid record with nothing left to change (duplicate type add, deleting
    /// an absent class); `version` is the applying log index
    Unchanged { version: u64 },
    /// Precondition no longer holds; state untouched
    Rejected { kind: RejectionKind, message: String },
}

impl MetaResponse {
    pub fn rejected(kind: RejectionKind, message: impl Into<String>) -> Self {
        MetaResponse::Rejected {
            kind,
            message: message.into(),
        }
    }

    /// Returns true if this is not a rejection
    pub fn is_ok(&self) -> bool {
        !matches!(self, MetaResponse::Rejected { .. })
    }

    /// Log index at which the record was applied
    pub fn version(&self) -> Option<u64> {
        match self {
            MetaResponse::Applied { version } | MetaResponse::Unchanged { version } => Some(*version),
            MetaResponse::Rejected { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            MetaResponse::Rejected { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{decode, encode};

    #[test]
    fn test_command_survives_encoding() {
        let cmd = MetaCommand::UpdatePropertyDataType {
            class_name: "Article".into(),
            property_name: "tags".into(),
            data_type: "text[]".into(),
        };
        let decoded: MetaCommand = decode(&encode(&cmd).unwrap()).unwrap();
        assert_eq!(decoded, cmd);
        assert_eq!(decoded.kind(), "UpdatePropertyDataType");
        assert_eq!(decoded.class_name(), "Article");
    }

    #[test]
    fn test_response_helpers() {
        let ok = MetaResponse::Applied { version: 4 };
        assert!(ok.is_ok());
        assert_eq!(ok.version(), Some(4));

        let rejected = MetaResponse::rejected(RejectionKind::AlreadyExists, "class Dup exists");
        assert!(!rejected.is_ok());
        assert_eq!(rejected.version(), None);
        assert_eq!(rejected.error_message(), Some("class Dup exists"));
    }
}
