use crate::placement::{rank_nodes, select_owners};
use crate::ShardingError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strata_commons::models::{ShardStatus, ShardingConfig, TenantActivityStatus};
use twox_hash::XxHash64;
use uuid::Uuid;

/// Seed used when hashing object keys onto the virtual ring.
const KEY_SEED: u64 = 0;

/// Upper bound on virtual shards of one class, whatever the config asks for.
pub const MAX_RING_SLOTS: u64 = 1 << 20;

/// A physical shard and the nodes holding a replica of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Physical {
    pub name: String,
    /// Names of the virtual shards routed to this shard (empty for tenants)
    pub owns_virtual: Vec<String>,
    /// Replica owners; the first entry is the primary owner
    pub belongs_to_nodes: Vec<String>,
    pub status: ShardStatus,
    /// Set only for tenant shards of multi-tenant classes
    pub activity_status: Option<TenantActivityStatus>,
}

impl Physical {
    pub fn tenant(name: impl Into<String>, nodes: Vec<String>, status: TenantActivityStatus) -> Self {
        Self {
            name: name.into(),
            owns_virtual: Vec::new(),
            belongs_to_nodes: nodes,
            status: ShardStatus::Ready,
            activity_status: Some(status),
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.belongs_to_nodes.first().map(String::as_str)
    }
}

/// A slot on the 64-bit hash ring. Keys whose hash is `<= upper` (and greater
/// than the previous slot's `upper`) belong to this slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Virtual {
    pub name: String,
    pub upper: u64,
    pub assigned_to_physical: String,
}

/// Per-class sharding state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingState {
    pub index_id: String,
    pub config: ShardingConfig,
    pub physical: BTreeMap<String, Physical>,
    /// Sorted by `upper`
    pub virtual_shards: Vec<Virtual>,
    pub partitioning_enabled: bool,
    pub replication_factor: u32,
}

impl ShardingState {
    /// Empty state for a multi-tenant class. Shards are added per tenant.
    pub fn partitioned(index_id: impl Into<String>, replication_factor: u32) -> Self {
        Self {
            index_id: index_id.into(),
            config: ShardingConfig::default(),
            physical: BTreeMap::new(),
            virtual_shards: Vec::new(),
            partitioning_enabled: true,
            replication_factor,
        }
    }

    /// Compute the initial layout of a class without multi-tenancy.
    ///
    /// Pure function of its inputs: every node derives the same shard names,
    /// ring and owners from the same node list.
    pub fn init(
        index_id: impl Into<String>,
        config: ShardingConfig,
        nodes: &[String],
        replication_factor: u32,
    ) -> Result<Self, ShardingError> {
        let index_id = index_id.into();
        let live = rank_nodes(&index_id, nodes);
        if live.is_empty() {
            return Err(ShardingError::NoNodes);
        }

        let count = if config.desired_count == 0 {
            live.len()
        } else {
            config.desired_count as usize
        };
        let per_physical = config.virtual_per_physical.max(1) as u64;
        let total = (count as u64)
            .checked_mul(per_physical)
            .filter(|total| *total <= MAX_RING_SLOTS)
            .ok_or(ShardingError::RingTooLarge {
                physical: count as u64,
                virtual_per_physical: per_physical,
            })?;

        let mut names: Vec<String> = Vec::with_capacity(count);
        let mut taken = BTreeSet::new();
        for i in 0..count as u64 {
            let mut seed = i;
            let name = loop {
                let candidate = physical_name(&index_id, seed);
                if taken.insert(candidate.clone()) {
                    break candidate;
                }
                seed += count as u64;
            };
            names.push(name);
        }

        let mut physical = BTreeMap::new();
        for name in &names {
            let owners = select_owners(name, nodes, replication_factor)?;
            physical.insert(
                name.clone(),
                Physical {
                    name: name.clone(),
                    owns_virtual: Vec::new(),
                    belongs_to_nodes: owners,
                    status: ShardStatus::Ready,
                    activity_status: None,
                },
            );
        }

        let mut uppers: Vec<u64> = (0..total)
            .map(|i| XxHash64::oneshot(i, index_id.as_bytes()))
            .collect();
        uppers.sort_unstable();
        uppers.dedup();

        let mut virtual_shards = Vec::with_capacity(uppers.len());
        for (i, upper) in uppers.into_iter().enumerate() {
            let owner = &names[i % count];
            let name = format!("{:016x}", upper);
            if let Some(p) = physical.get_mut(owner) {
                p.owns_virtual.push(name.clone());
            }
            virtual_shards.push(Virtual {
                name,
                upper,
                assigned_to_physical: owner.clone(),
            });
        }

        Ok(Self {
            index_id,
            config,
            physical,
            virtual_shards,
            partitioning_enabled: false,
            replication_factor,
        })
    }

    pub fn count(&self) -> usize {
        self.physical.len()
    }

    pub fn shard(&self, name: &str) -> Option<&Physical> {
        self.physical.get(name)
    }

    pub fn owner(&self, shard: &str) -> Option<&str> {
        self.physical.get(shard).and_then(Physical::owner)
    }

    pub fn replicas(&self, shard: &str) -> Option<&[String]> {
        self.physical.get(shard).map(|p| p.belongs_to_nodes.as_slice())
    }

    /// Physical shard for an arbitrary key, `None` for partitioned classes.
    pub fn physical_for_key(&self, key: &[u8]) -> Option<&str> {
        if self.partitioning_enabled || self.virtual_shards.is_empty() {
            return None;
        }
        let token = XxHash64::oneshot(KEY_SEED, key);
        let idx = self.virtual_shards.partition_point(|v| v.upper < token);
        // past the last slot wraps around to the first
        let slot = self.virtual_shards.get(idx).or_else(|| self.virtual_shards.first())?;
        Some(slot.assigned_to_physical.as_str())
    }

    pub fn physical_for_uuid(&self, id: &Uuid) -> Option<&str> {
        self.physical_for_key(id.as_bytes())
    }

    /// Insert a pre-placed tenant shard.
    pub fn add_partition(&mut self, shard: Physical) -> Result<(), ShardingError> {
        if !self.partitioning_enabled {
            return Err(ShardingError::Partitioning("disabled"));
        }
        if self.physical.contains_key(&shard.name) {
            return Err(ShardingError::ShardExists(shard.name));
        }
        self.physical.insert(shard.name.clone(), shard);
        Ok(())
    }

    /// Remove a tenant shard. Returns whether it existed.
    pub fn delete_partition(&mut self, name: &str) -> bool {
        self.partitioning_enabled && self.physical.remove(name).is_some()
    }

    pub fn set_status(&mut self, shard: &str, status: ShardStatus) -> Result<(), ShardingError> {
        let p = self
            .physical
            .get_mut(shard)
            .ok_or_else(|| ShardingError::ShardNotFound(shard.to_string()))?;
        p.status = status;
        Ok(())
    }

    /// Update a tenant's activity status. Returns whether the tenant existed.
    pub fn set_activity(&mut self, tenant: &str, status: TenantActivityStatus) -> bool {
        match self.physical.get_mut(tenant) {
            Some(p) if self.partitioning_enabled => {
                p.activity_status = Some(status);
                true
            }
            _ => false,
        }
    }

    /// Grow every shard to `factor` replicas. Existing owners are kept; new
    /// owners are taken in rendezvous order.
    pub fn extend_replication(&mut self, nodes: &[String], factor: u32) -> Result<(), ShardingError> {
        if factor <= self.replication_factor {
            return Ok(());
        }
        for shard in self.physical.values_mut() {
            for node in rank_nodes(&shard.name, nodes) {
                if shard.belongs_to_nodes.len() >= factor as usize {
                    break;
                }
                if !shard.belongs_to_nodes.contains(&node) {
                    shard.belongs_to_nodes.push(node);
                }
            }
            if shard.belongs_to_nodes.len() < factor as usize {
                return Err(ShardingError::NotEnoughNodes {
                    factor,
                    available: shard.belongs_to_nodes.len(),
                });
            }
        }
        self.replication_factor = factor;
        Ok(())
    }

    /// Owners referenced by any shard that are not in `nodes`.
    pub fn unknown_owners(&self, nodes: &[String]) -> BTreeSet<String> {
        self.physical
            .values()
            .flat_map(|p| p.belongs_to_nodes.iter())
            .filter(|n| !nodes.contains(n))
            .cloned()
            .collect()
    }

    pub fn shard_names(&self) -> impl Iterator<Item = &str> {
        self.physical.keys().map(String::as_str)
    }
}

/// Deterministic physical shard name: 12 hex chars derived from the class
/// and ordinal.
fn physical_name(index_id: &str, ordinal: u64) -> String {
    let hash = XxHash64::oneshot(ordinal.wrapping_add(1), index_id.as_bytes());
    format!("{:016x}", hash)[..12].to_string()
}
