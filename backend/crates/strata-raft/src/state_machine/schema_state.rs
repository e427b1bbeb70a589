//! Immutable schema projection
//!
//! A `SchemaState` is never mutated once published: the state machine clones
//! it, applies one entry to the clone and swaps the result in. Readers holding
//! an `Arc<SchemaState>` keep a consistent view for as long as they need it.
//! Classes sit behind their own `Arc` so the clone only copies pointers for
//! classes the entry does not touch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_commons::models::{
    Class, ClassInfo, Schema, ShardStatusInfo, Tenant, TenantActivityStatus,
};
use strata_sharding::{Physical, ShardingState};
use uuid::Uuid;

use crate::commands::{MetaCommand, MetaResponse, RejectionKind, TenantPlacement};

/// A class together with its sharding state and versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaClass {
    pub class: Class,
    pub sharding: ShardingState,
    /// Log index of the last mutation of this class
    pub class_version: u64,
    /// Log index of the last sharding change of this class
    pub shard_version: u64,
}

/// Projection of a committed membership entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub name: String,
    pub raft_id: u64,
    pub rpc_addr: String,
    pub api_addr: String,
    pub voter: bool,
}

/// Everything the meta group replicates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaState {
    classes: BTreeMap<String, Arc<MetaClass>>,
    nodes: BTreeMap<String, ClusterMember>,
    applied_index: u64,
}

impl SchemaState {
    // =========================================================================
    // Reads
    // =========================================================================

    /// Log index this projection reflects
    pub fn applied_index(&self) -> u64 {
        self.applied_index
    }

    /// Exact-name lookup
    pub fn class(&self, name: &str) -> Option<&MetaClass> {
        self.classes.get(name).map(Arc::as_ref)
    }

    /// Case-insensitive lookup, for name collision checks
    pub fn class_ignore_case(&self, name: &str) -> Option<&MetaClass> {
        self.class(name).or_else(|| {
            self.classes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_ref())
        })
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn read_only_class(&self, name: &str) -> Option<Class> {
        self.class(name).map(|c| c.class.clone())
    }

    pub fn read_only_schema(&self) -> Schema {
        Schema {
            classes: self.classes.values().map(|c| c.class.clone()).collect(),
        }
    }

    pub fn class_info(&self, name: &str) -> ClassInfo {
        match self.class(name) {
            Some(c) => ClassInfo {
                exists: true,
                multi_tenancy: c.class.multi_tenancy_config.unwrap_or_default(),
                replication_factor: c.sharding.replication_factor,
                tenants: if c.sharding.partitioning_enabled {
                    c.sharding.count()
                } else {
                    0
                },
                properties: c.class.properties.len(),
                class_version: c.class_version,
                shard_version: c.shard_version,
            },
            None => ClassInfo::default(),
        }
    }

    pub fn copy_sharding_state(&self, class: &str) -> Option<ShardingState> {
        self.class(class).map(|c| c.sharding.clone())
    }

    pub fn shard_owner(&self, class: &str, shard: &str) -> Option<String> {
        self.class(class)?.sharding.owner(shard).map(str::to_string)
    }

    pub fn shard_replicas(&self, class: &str, shard: &str) -> Option<Vec<String>> {
        self.class(class)?.sharding.replicas(shard).map(<[String]>::to_vec)
    }

    /// Physical shard holding the object `id`. `None` for unknown classes and
    /// for multi-tenant classes, which route by tenant instead.
    pub fn shard_from_uuid(&self, class: &str, id: &Uuid) -> Option<String> {
        self.class(class)?.sharding.physical_for_uuid(id).map(str::to_string)
    }

    /// Shard name and activity status of a tenant
    pub fn tenant_shard(&self, class: &str, tenant: &str) -> Option<(String, TenantActivityStatus)> {
        let meta = self.class(class)?;
        if !meta.sharding.partitioning_enabled {
            return None;
        }
        let shard = meta.sharding.shard(tenant)?;
        Some((
            shard.name.clone(),
            shard.activity_status.unwrap_or_default(),
        ))
    }

    pub fn tenants(&self, class: &str) -> Option<Vec<Tenant>> {
        let meta = self.class(class)?;
        if !meta.sharding.partitioning_enabled {
            return Some(Vec::new());
        }
        Some(
            meta.sharding
                .physical
                .values()
                .map(|p| Tenant::new(p.name.clone()).with_status(p.activity_status.unwrap_or_default()))
                .collect(),
        )
    }

    pub fn shards_status(&self, class: &str) -> Option<Vec<ShardStatusInfo>> {
        let meta = self.class(class)?;
        Some(
            meta.sharding
                .physical
                .values()
                .map(|p| ShardStatusInfo {
                    name: p.name.clone(),
                    status: p.status,
                })
                .collect(),
        )
    }

    pub fn members(&self) -> impl Iterator<Item = &ClusterMember> {
        self.nodes.values()
    }

    pub fn member(&self, name: &str) -> Option<&ClusterMember> {
        self.nodes.get(name)
    }

    pub fn member_by_raft_id(&self, raft_id: u64) -> Option<&ClusterMember> {
        self.nodes.values().find(|m| m.raft_id == raft_id)
    }

    /// Total physical shards across all classes (tenants included)
    pub fn shard_count(&self) -> usize {
        self.classes.values().map(|c| c.sharding.count()).sum()
    }

    pub fn tenant_count(&self) -> usize {
        self.classes
            .values()
            .filter(|c| c.sharding.partitioning_enabled)
            .map(|c| c.sharding.count())
            .sum()
    }

    // =========================================================================
    // Writes (single applier only)
    // =========================================================================

    pub(crate) fn set_applied_index(&mut self, index: u64) {
        self.applied_index = index;
    }

    pub(crate) fn set_members(&mut self, members: Vec<ClusterMember>) {
        self.nodes = members.into_iter().map(|m| (m.name.clone(), m)).collect();
    }

    /// Apply one record at log `index`.
    ///
    /// Total: every record yields a response. Preconditions invalidated by an
    /// earlier entry produce `Rejected` and leave the state untouched.
    pub(crate) fn apply_command(&mut self, index: u64, cmd: MetaCommand) -> MetaResponse {
        match cmd {
            MetaCommand::AddClass { class, state } | MetaCommand::RestoreClass { class, state } => {
                self.add_class(index, class, state)
            }
            MetaCommand::UpdateClass {
                class_name,
                class,
                state,
            } => self.update_class(index, &class_name, class, state),
            MetaCommand::DeleteClass { class_name } => {
                if self.classes.remove(&class_name).is_some() {
                    MetaResponse::Applied { version: index }
                } else {
                    MetaResponse::Unchanged { version: index }
                }
            }
            MetaCommand::AddProperty {
                class_name,
                property,
            } => {
                let Some(meta) = self.classes.get_mut(&class_name) else {
                    return class_not_found(&class_name);
                };
                if meta.class.property_ignore_case(&property.name).is_some() {
                    return MetaResponse::rejected(
                        RejectionKind::AlreadyExists,
                        format!("property '{}' already exists in class '{}'", property.name, class_name),
                    );
                }
                let meta = Arc::make_mut(meta);
                meta.class.properties.push(property);
                meta.class_version = index;
                MetaResponse::Applied { version: index }
            }
            MetaCommand::UpdatePropertyDataType {
                class_name,
                property_name,
                data_type,
            } => {
                let Some(meta) = self.classes.get_mut(&class_name) else {
                    return class_not_found(&class_name);
                };
                match meta.class.property(&property_name) {
                    None => {
                        return MetaResponse::rejected(
                            RejectionKind::NotFound,
                            format!("property '{}' not found in class '{}'", property_name, class_name),
                        )
                    }
                    // A concurrent record already appended the type
                    Some(p) if p.has_data_type(&data_type) => {
                        return MetaResponse::Unchanged { version: index }
                    }
                    Some(_) => {}
                }
                let meta = Arc::make_mut(meta);
                if let Some(p) = meta.class.property_mut(&property_name) {
                    p.add_data_type(&data_type);
                }
                meta.class_version = index;
                MetaResponse::Applied { version: index }
            }
            MetaCommand::UpdateShardStatus {
                class_name,
                shard_name,
                status,
            } => {
                let Some(meta) = self.classes.get_mut(&class_name) else {
                    return class_not_found(&class_name);
                };
                if meta.sharding.shard(&shard_name).is_none() {
                    return MetaResponse::rejected(
                        RejectionKind::NotFound,
                        format!("shard '{}' not found in class '{}'", shard_name, class_name),
                    );
                }
                let meta = Arc::make_mut(meta);
                if let Err(e) = meta.sharding.set_status(&shard_name, status) {
                    return MetaResponse::rejected(RejectionKind::NotFound, e.to_string());
                }
                meta.shard_version = index;
                MetaResponse::Applied { version: index }
            }
            MetaCommand::AddTenants {
                class_name,
                tenants,
            } => self.add_tenants(index, &class_name, tenants),
            MetaCommand::UpdateTenants {
                class_name,
                tenants,
            } => self.with_partitioned(index, &class_name, |sharding| {
                tenants
                    .iter()
                    .filter(|t| sharding.set_activity(&t.name, t.activity_status))
                    .count()
            }),
            MetaCommand::DeleteTenants {
                class_name,
                tenants,
            } => self.with_partitioned(index, &class_name, |sharding| {
                tenants.iter().filter(|t| sharding.delete_partition(t)).count()
            }),
        }
    }

    fn add_class(&mut self, index: u64, class: Class, state: ShardingState) -> MetaResponse {
        if let Some(existing) = self.class_ignore_case(&class.name) {
            return MetaResponse::rejected(
                RejectionKind::AlreadyExists,
                format!("class '{}' already exists", existing.class.name),
            );
        }
        self.classes.insert(
            class.name.clone(),
            Arc::new(MetaClass {
                class,
                sharding: state,
                class_version: index,
                shard_version: index,
            }),
        );
        MetaResponse::Applied { version: index }
    }

    fn update_class(
        &mut self,
        index: u64,
        class_name: &str,
        mut class: Class,
        state: Option<ShardingState>,
    ) -> MetaResponse {
        let Some(meta) = self.classes.get_mut(class_name) else {
            return class_not_found(class_name);
        };
        let meta = Arc::make_mut(meta);

        // Properties only change through AddProperty/UpdatePropertyDataType,
        // which may have committed after this record was planned.
        class.name = meta.class.name.clone();
        class.properties = meta.class.properties.clone();
        meta.class = class;
        meta.class_version = index;

        if let Some(state) = state {
            // Merge owners into the current layout so shards added since
            // planning (tenants) survive.
            for (name, planned) in state.physical {
                if let Some(current) = meta.sharding.physical.get_mut(&name) {
                    for node in planned.belongs_to_nodes {
                        if !current.belongs_to_nodes.contains(&node) {
                            current.belongs_to_nodes.push(node);
                        }
                    }
                }
            }
            meta.sharding.replication_factor =
                meta.sharding.replication_factor.max(state.replication_factor);
            meta.shard_version = index;
        }
        MetaResponse::Applied { version: index }
    }

    fn add_tenants(&mut self, index: u64, class_name: &str, tenants: Vec<TenantPlacement>) -> MetaResponse {
        let Some(meta) = self.classes.get_mut(class_name) else {
            return class_not_found(class_name);
        };
        if !meta.sharding.partitioning_enabled {
            return multi_tenancy_disabled(class_name);
        }
        let fresh: Vec<TenantPlacement> = tenants
            .into_iter()
            .filter(|t| meta.sharding.shard(&t.name).is_none())
            .collect();
        if fresh.is_empty() {
            return MetaResponse::Unchanged { version: index };
        }
        let meta = Arc::make_mut(meta);
        for t in fresh {
            // Duplicates within one record: the first one wins
            let _ = meta
                .sharding
                .add_partition(Physical::tenant(t.name, t.nodes, t.status));
        }
        meta.shard_version = index;
        MetaResponse::Applied { version: index }
    }

    /// Run `f` on the sharding state of a multi-tenant class. `f` returns the
    /// number of tenants it changed.
    fn with_partitioned<F>(&mut self, index: u64, class_name: &str, f: F) -> MetaResponse
    where
        F: FnOnce(&mut ShardingState) -> usize,
    {
        let Some(meta) = self.classes.get_mut(class_name) else {
            return class_not_found(class_name);
        };
        if !meta.sharding.partitioning_enabled {
            return multi_tenancy_disabled(class_name);
        }
        let mut sharding = meta.sharding.clone();
        if f(&mut sharding) == 0 {
            return MetaResponse::Unchanged { version: index };
        }
        let meta = Arc::make_mut(meta);
        meta.sharding = sharding;
        meta.shard_version = index;
        MetaResponse::Applied { version: index }
    }
}

fn class_not_found(class_name: &str) -> MetaResponse {
    MetaResponse::rejected(
        RejectionKind::NotFound,
        format!("class '{}' not found", class_name),
    )
}

fn multi_tenancy_disabled(class_name: &str) -> MetaResponse {
    MetaResponse::rejected(
        RejectionKind::ValidationFailed,
        format!("multi-tenancy is not enabled for class '{}'", class_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_commons::models::{Property, ShardStatus, ShardingConfig};

    fn nodes() -> Vec<String> {
        vec!["n1".to_string(), "n2".to_string()]
    }

    fn add_article(state: &mut SchemaState, index: u64) -> MetaResponse {
        let class = Class::new("Article").with_property(Property::new("tags", vec!["text"]));
        let sharding = ShardingState::init("Article", ShardingConfig::default(), &nodes(), 1).unwrap();
        state.apply_command(index, MetaCommand::AddClass { class, state: sharding })
    }

    fn add_shop(state: &mut SchemaState, index: u64) -> MetaResponse {
        let class = Class::new("Shop").with_multi_tenancy(true);
        state.apply_command(
            index,
            MetaCommand::AddClass {
                class,
                state: ShardingState::partitioned("Shop", 1),
            },
        )
    }

    fn placement(name: &str) -> TenantPlacement {
        TenantPlacement {
            name: name.to_string(),
            status: TenantActivityStatus::Active,
            nodes: vec!["n1".to_string()],
        }
    }

    #[test]
    fn test_duplicate_add_class_rejected_case_insensitive() {
        let mut state = SchemaState::default();
        assert_eq!(add_article(&mut state, 1), MetaResponse::Applied { version: 1 });

        let dup = Class::new("ARTICLE");
        let response = state.apply_command(
            2,
            MetaCommand::AddClass {
                class: dup,
                state: ShardingState::partitioned("ARTICLE", 1),
            },
        );
        assert!(matches!(
            response,
            MetaResponse::Rejected { kind: RejectionKind::AlreadyExists, .. }
        ));
        assert_eq!(state.class_count(), 1);
    }

    #[test]
    fn test_data_type_append_is_idempotent() {
        let mut state = SchemaState::default();
        add_article(&mut state, 1);
        let cmd = MetaCommand::UpdatePropertyDataType {
            class_name: "Article".into(),
            property_name: "tags".into(),
            data_type: "text[]".into(),
        };

        assert_eq!(state.apply_command(2, cmd.clone()), MetaResponse::Applied { version: 2 });
        assert_eq!(state.apply_command(3, cmd), MetaResponse::Unchanged { version: 3 });

        let class = state.read_only_class("Article").unwrap();
        assert_eq!(class.property("tags").unwrap().data_type, vec!["text", "text[]"]);
        assert_eq!(state.class_info("Article").class_version, 2);
    }

    #[test]
    fn test_update_property_on_missing_targets() {
        let mut state = SchemaState::default();
        add_article(&mut state, 1);
        let missing_prop = state.apply_command(
            2,
            MetaCommand::UpdatePropertyDataType {
                class_name: "Article".into(),
                property_name: "nope".into(),
                data_type: "int".into(),
            },
        );
        assert!(matches!(missing_prop, MetaResponse::Rejected { kind: RejectionKind::NotFound, .. }));

        let missing_class = state.apply_command(3, MetaCommand::DeleteTenants {
            class_name: "Nope".into(),
            tenants: vec![],
        });
        assert!(matches!(missing_class, MetaResponse::Rejected { kind: RejectionKind::NotFound, .. }));
    }

    #[test]
    fn test_add_property_conflict() {
        let mut state = SchemaState::default();
        add_article(&mut state, 1);
        let response = state.apply_command(
            2,
            MetaCommand::AddProperty {
                class_name: "Article".into(),
                property: Property::new("Tags", vec!["int"]),
            },
        );
        assert!(matches!(response, MetaResponse::Rejected { kind: RejectionKind::AlreadyExists, .. }));
    }

    #[test]
    fn test_tenants_require_multi_tenancy() {
        let mut state = SchemaState::default();
        add_article(&mut state, 1);
        let response = state.apply_command(
            2,
            MetaCommand::AddTenants {
                class_name: "Article".into(),
                tenants: vec![placement("t1")],
            },
        );
        assert!(matches!(
            response,
            MetaResponse::Rejected { kind: RejectionKind::ValidationFailed, .. }
        ));
    }

    #[test]
    fn test_tenant_lifecycle() {
        let mut state = SchemaState::default();
        add_shop(&mut state, 1);

        let add = MetaCommand::AddTenants {
            class_name: "Shop".into(),
            tenants: vec![placement("t1"), placement("t2")],
        };
        assert_eq!(state.apply_command(2, add.clone()), MetaResponse::Applied { version: 2 });
        assert_eq!(state.apply_command(3, add), MetaResponse::Unchanged { version: 3 });
        assert_eq!(state.class_info("Shop").tenants, 2);

        let update = MetaCommand::UpdateTenants {
            class_name: "Shop".into(),
            tenants: vec![Tenant::new("t1").with_status(TenantActivityStatus::Frozen)],
        };
        assert_eq!(state.apply_command(4, update), MetaResponse::Applied { version: 4 });
        assert_eq!(
            state.tenant_shard("Shop", "t1"),
            Some(("t1".to_string(), TenantActivityStatus::Frozen))
        );

        let delete = MetaCommand::DeleteTenants {
            class_name: "Shop".into(),
            tenants: vec!["t2".into(), "missing".into()],
        };
        assert_eq!(state.apply_command(5, delete), MetaResponse::Applied { version: 5 });
        assert_eq!(state.tenants("Shop").unwrap().len(), 1);
        assert_eq!(state.class_info("Shop").shard_version, 5);
    }

    #[test]
    fn test_update_class_keeps_properties_and_never_shrinks() {
        let mut state = SchemaState::default();
        add_article(&mut state, 1);
        let shards_before = state.class("Article").unwrap().sharding.count();

        // planned before a property was added
        let planned = state.read_only_class("Article").unwrap();
        state.apply_command(
            2,
            MetaCommand::AddProperty {
                class_name: "Article".into(),
                property: Property::new("title", vec!["text"]),
            },
        );

        let mut grown = state.copy_sharding_state("Article").unwrap();
        grown.extend_replication(&nodes(), 2).unwrap();
        let mut updated = planned;
        updated.description = Some("news".into());
        let response = state.apply_command(
            3,
            MetaCommand::UpdateClass {
                class_name: "Article".into(),
                class: updated,
                state: Some(grown),
            },
        );
        assert_eq!(response, MetaResponse::Applied { version: 3 });

        let meta = state.class("Article").unwrap();
        assert_eq!(meta.class.description.as_deref(), Some("news"));
        assert_eq!(meta.class.properties.len(), 2);
        assert_eq!(meta.sharding.count(), shards_before);
        assert_eq!(meta.sharding.replication_factor, 2);
        assert!(meta.sharding.physical.values().all(|p| p.belongs_to_nodes.len() == 2));
    }

    #[test]
    fn test_shard_status_and_queries() {
        let mut state = SchemaState::default();
        add_article(&mut state, 1);
        let shard = state.class("Article").unwrap().sharding.shard_names().next().unwrap().to_string();

        let response = state.apply_command(
            2,
            MetaCommand::UpdateShardStatus {
                class_name: "Article".into(),
                shard_name: shard.clone(),
                status: ShardStatus::ReadOnly,
            },
        );
        assert!(response.is_ok());
        let statuses = state.shards_status("Article").unwrap();
        assert!(statuses.iter().any(|s| s.name == shard && s.status == ShardStatus::ReadOnly));
        assert!(state.shard_owner("Article", &shard).is_some());
        assert_eq!(state.shard_replicas("Article", &shard).unwrap().len(), 1);
        assert!(state.shard_from_uuid("Article", &Uuid::from_u128(7)).is_some());

        let missing = state.apply_command(
            3,
            MetaCommand::UpdateShardStatus {
                class_name: "Article".into(),
                shard_name: "nope".into(),
                status: ShardStatus::Ready,
            },
        );
        assert!(matches!(missing, MetaResponse::Rejected { kind: RejectionKind::NotFound, .. }));
    }

    #[test]
    fn test_delete_class_is_idempotent() {
        let mut state = SchemaState::default();
        add_article(&mut state, 1);
        let cmd = MetaCommand::DeleteClass {
            class_name: "Article".into(),
        };
        assert_eq!(state.apply_command(2, cmd.clone()), MetaResponse::Applied { version: 2 });
        assert_eq!(state.apply_command(3, cmd), MetaResponse::Unchanged { version: 3 });
        assert!(!state.class_info("Article").exists);
    }

    #[test]
    fn test_clone_shares_untouched_classes() {
        let mut state = SchemaState::default();
        add_article(&mut state, 1);
        add_shop(&mut state, 2);

        let before = state.clone();
        state.apply_command(
            3,
            MetaCommand::AddTenants {
                class_name: "Shop".into(),
                tenants: vec![placement("t1")],
            },
        );
        assert!(Arc::ptr_eq(&before.classes["Article"], &state.classes["Article"]));
        assert!(!Arc::ptr_eq(&before.classes["Shop"], &state.classes["Shop"]));
        assert_eq!(before.class_info("Shop").tenants, 0);
    }
}
