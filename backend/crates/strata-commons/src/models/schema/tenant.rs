use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Activity status of a tenant shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TenantActivityStatus {
    #[default]
    Active,
    Cold,
    Frozen,
}

impl TenantActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantActivityStatus::Active => "ACTIVE",
            TenantActivityStatus::Cold => "COLD",
            TenantActivityStatus::Frozen => "FROZEN",
        }
    }
}

impl fmt::Display for TenantActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            // HOT is the legacy spelling of ACTIVE
            "ACTIVE" | "HOT" => Ok(TenantActivityStatus::Active),
            "COLD" => Ok(TenantActivityStatus::Cold),
            "FROZEN" => Ok(TenantActivityStatus::Frozen),
            _ => Err(format!("invalid tenant activity status '{}'", s)),
        }
    }
}

/// A tenant of a multi-tenant class. Each tenant maps to exactly one shard
/// with the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    #[serde(default)]
    pub activity_status: TenantActivityStatus,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activity_status: TenantActivityStatus::Active,
        }
    }

    pub fn with_status(mut self, status: TenantActivityStatus) -> Self {
        self.activity_status = status;
        self
    }
}
