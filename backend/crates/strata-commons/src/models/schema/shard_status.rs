use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operational status of a physical shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShardStatus {
    #[default]
    Ready,
    ReadOnly,
    Indexing,
}

impl ShardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardStatus::Ready => "READY",
            ShardStatus::ReadOnly => "READONLY",
            ShardStatus::Indexing => "INDEXING",
        }
    }
}

impl fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "READY" => Ok(ShardStatus::Ready),
            "READONLY" => Ok(ShardStatus::ReadOnly),
            "INDEXING" => Ok(ShardStatus::Indexing),
            _ => Err(format!("invalid shard status '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("readonly".parse::<ShardStatus>().unwrap(), ShardStatus::ReadOnly);
        assert_eq!("READY".parse::<ShardStatus>().unwrap(), ShardStatus::Ready);
        assert!("broken".parse::<ShardStatus>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ShardStatus::Indexing.to_string(), "INDEXING");
    }
}
