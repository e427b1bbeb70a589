//! Schema mutation planner
//!
//! Turns a raw request plus a read-only [`SchemaState`] snapshot into a fully
//! resolved [`MetaCommand`]: names normalized, defaults filled in, shard
//! owners chosen. Everything rejected here is rejected before the consensus
//! log sees it.

use std::collections::BTreeSet;
use std::sync::Arc;

use strata_commons::config::SchemaSettings;
use strata_commons::models::{
    Class, InvertedIndexConfig, Property, ReplicationConfig, ShardStatus,
    ShardingConfig, Tenant,
};
use strata_raft::{MetaClass, MetaCommand, SchemaState, TenantPlacement};
use strata_sharding::{select_owners, ShardingError, ShardingState, MAX_RING_SLOTS};

use crate::cluster_state::ClusterState;
use crate::error::{Result, SchemaError};
use crate::validator::{
    normalize_class_name, normalize_property_name, validate_class_name,
    validate_inverted_index_config, validate_properties, validate_property,
    validate_sharding_config, validate_tenant_name, validate_vector_index_config, ConfigValidator,
};

pub struct Parser {
    cluster_state: Arc<dyn ClusterState>,
    validator: Arc<dyn ConfigValidator>,
    settings: SchemaSettings,
}

impl Parser {
    pub fn new(
        cluster_state: Arc<dyn ClusterState>,
        validator: Arc<dyn ConfigValidator>,
        settings: SchemaSettings,
    ) -> Self {
        Self {
            cluster_state,
            validator,
            settings,
        }
    }

    /// Nodes eligible to own shards: known to the directory and a voting
    /// member of the replicated membership. Before any membership entry is
    /// applied every known node is eligible.
    pub fn live_nodes(&self, state: &SchemaState) -> Vec<String> {
        let known = self.cluster_state.all_names();
        let voters: BTreeSet<&str> = state
            .members()
            .filter(|m| m.voter)
            .map(|m| m.name.as_str())
            .collect();
        if voters.is_empty() {
            return known;
        }
        known
            .into_iter()
            .filter(|n| voters.contains(n.as_str()))
            .collect()
    }

    // =========================================================================
    // Classes
    // =========================================================================

    pub fn parse_add_class(&self, class: Class, state: &SchemaState) -> Result<MetaCommand> {
        let class = self.prepare_new_class(class, state)?;
        let nodes = self.live_nodes(state);
        let factor = class.replication_factor();

        let sharding = if class.multi_tenancy_enabled() {
            if nodes.len() < factor as usize {
                return Err(ShardingError::NotEnoughNodes {
                    factor,
                    available: nodes.len(),
                }
                .into());
            }
            ShardingState::partitioned(class.name.clone(), factor)
        } else {
            let config = class.sharding_config.clone().unwrap_or_default();
            ShardingState::init(class.name.clone(), config, &nodes, factor)?
        };

        Ok(MetaCommand::AddClass {
            class,
            state: sharding,
        })
    }

    /// Like AddClass, but with the sharding layout recorded in a backup.
    pub fn parse_restore_class(
        &self,
        class: Class,
        mut sharding: ShardingState,
        state: &SchemaState,
    ) -> Result<MetaCommand> {
        let class = self.prepare_new_class(class, state)?;

        if sharding.partitioning_enabled != class.multi_tenancy_enabled() {
            return Err(SchemaError::validation(format!(
                "sharding state of '{}' does not match its multi-tenancy setting",
                class.name
            )));
        }
        if !sharding.partitioning_enabled
            && (sharding.count() > self.settings.max_shards_per_class as usize
                || sharding.virtual_shards.len() as u64 > MAX_RING_SLOTS)
        {
            return Err(SchemaError::validation(format!(
                "cannot restore class '{}': {} shards with {} virtual shards exceed the limits",
                class.name,
                sharding.count(),
                sharding.virtual_shards.len()
            )));
        }
        let nodes = self.live_nodes(state);
        let unknown = sharding.unknown_owners(&nodes);
        if !unknown.is_empty() {
            return Err(SchemaError::validation(format!(
                "cannot restore class '{}': shard owners {:?} are not cluster members",
                class.name, unknown
            )));
        }
        sharding.index_id = class.name.clone();

        Ok(MetaCommand::RestoreClass {
            class,
            state: sharding,
        })
    }

    pub fn parse_update_class(
        &self,
        class_name: &str,
        mut update: Class,
        state: &SchemaState,
    ) -> Result<MetaCommand> {
        let meta = existing_class(state, class_name)?;
        let current = &meta.class;

        if !update.name.is_empty() && normalize_class_name(&update.name) != current.name {
            return Err(SchemaError::validation(format!(
                "class name is immutable: attempted change from '{}' to '{}'",
                current.name, update.name
            )));
        }
        update.name = current.name.clone();

        if !update.properties.is_empty() && update.properties != current.properties {
            return Err(SchemaError::validation(
                "properties cannot be updated through an update of the class, use AddProperty",
            ));
        }
        update.properties = current.properties.clone();

        if update.multi_tenancy_config.is_some()
            && update.multi_tenancy_enabled() != current.multi_tenancy_enabled()
        {
            return Err(SchemaError::validation(format!(
                "multi-tenancy of class '{}' cannot be toggled",
                current.name
            )));
        }
        update.multi_tenancy_config = current.multi_tenancy_config;

        if let Some(config) = &update.sharding_config {
            if Some(config) != current.sharding_config.as_ref() {
                return Err(SchemaError::validation(format!(
                    "sharding config of class '{}' is immutable",
                    current.name
                )));
            }
        }
        update.sharding_config = current.sharding_config.clone();

        if let Some(vectorizer) = &update.vectorizer {
            if Some(vectorizer) != current.vectorizer.as_ref() {
                return Err(SchemaError::validation(format!(
                    "vectorizer of class '{}' is immutable",
                    current.name
                )));
            }
        }
        update.vectorizer = current.vectorizer.clone();

        // Unset index configs keep their current value
        match (&current.vector_index_config, &update.vector_index_config) {
            (Some(old), Some(new)) => self.validator.validate_vector_index_config_update(old, new)?,
            (None, Some(new)) => validate_vector_index_config(new)?,
            (_, None) => {}
        }
        if update.vector_index_config.is_none() {
            update.vector_index_config = current.vector_index_config.clone();
        }

        if update.vector_config.is_empty() {
            update.vector_config = current.vector_config.clone();
        } else {
            self.validator
                .validate_vector_index_configs_update(&current.vector_config, &update.vector_config)?;
        }

        match (&current.inverted_index_config, &update.inverted_index_config) {
            (Some(old), Some(new)) => {
                self.validator.validate_inverted_index_config_update(old, new)?
            }
            (None, Some(new)) => validate_inverted_index_config(new)?,
            (_, None) => {}
        }
        if update.inverted_index_config.is_none() {
            update.inverted_index_config = current.inverted_index_config.clone();
        }

        let current_factor = meta.sharding.replication_factor;
        let factor = update
            .replication_config
            .map(|c| c.factor)
            .unwrap_or(current_factor);
        if factor == 0 {
            return Err(ShardingError::ZeroReplication.into());
        }
        if factor < current_factor {
            return Err(SchemaError::validation(format!(
                "scaling replication factor of '{}' down from {} to {} is not supported",
                current.name, current_factor, factor
            )));
        }
        update.replication_config = Some(ReplicationConfig { factor });

        let sharding = if factor > current_factor {
            let nodes = self.live_nodes(state);
            let mut sharding = meta.sharding.clone();
            sharding.extend_replication(&nodes, factor)?;
            Some(sharding)
        } else {
            None
        };

        Ok(MetaCommand::UpdateClass {
            class_name: current.name.clone(),
            class: update,
            state: sharding,
        })
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub fn parse_add_property(
        &self,
        class_name: &str,
        mut property: Property,
        state: &SchemaState,
    ) -> Result<MetaCommand> {
        let meta = existing_class(state, class_name)?;
        self.property_defaults(&mut property);

        if let Some(existing) = meta.class.property_ignore_case(&property.name) {
            return Err(SchemaError::AlreadyExists(format!(
                "property '{}' already exists in class '{}'",
                existing.name, class_name
            )));
        }
        validate_property(class_name, &property, &|c: &str| state.class(c).is_some())?;

        Ok(MetaCommand::AddProperty {
            class_name: class_name.to_string(),
            property,
        })
    }

    /// `None` when the property already carries `data_type`: nothing is
    /// proposed for a duplicate add.
    pub fn parse_update_property_data_type(
        &self,
        class_name: &str,
        property_name: &str,
        data_type: &str,
        state: &SchemaState,
    ) -> Result<Option<MetaCommand>> {
        let meta = existing_class(state, class_name)?;
        let property = meta.class.property(property_name).ok_or_else(|| {
            SchemaError::not_found(format!(
                "property '{}' not found in class '{}'",
                property_name, class_name
            ))
        })?;

        if property.has_data_type(data_type) {
            return Ok(None);
        }

        // The widened property must satisfy the same rules as at creation
        let mut widened = property.clone();
        widened.data_type.push(data_type.to_string());
        validate_property(&meta.class.name, &widened, &|c: &str| state.class(c).is_some())?;

        Ok(Some(MetaCommand::UpdatePropertyDataType {
            class_name: class_name.to_string(),
            property_name: property_name.to_string(),
            data_type: data_type.to_string(),
        }))
    }

    // =========================================================================
    // Shards and tenants
    // =========================================================================

    pub fn parse_update_shard_status(
        &self,
        class_name: &str,
        shard_name: &str,
        status: &str,
        state: &SchemaState,
    ) -> Result<MetaCommand> {
        let status: ShardStatus = status.parse().map_err(SchemaError::ValidationFailed)?;
        let meta = existing_class(state, class_name)?;
        if meta.sharding.shard(shard_name).is_none() {
            return Err(SchemaError::not_found(format!(
                "shard '{}' not found in class '{}'",
                shard_name, class_name
            )));
        }
        Ok(MetaCommand::UpdateShardStatus {
            class_name: class_name.to_string(),
            shard_name: shard_name.to_string(),
            status,
        })
    }

    /// `None` when every requested tenant already exists.
    pub fn parse_add_tenants(
        &self,
        class_name: &str,
        tenants: Vec<Tenant>,
        state: &SchemaState,
    ) -> Result<Option<MetaCommand>> {
        let meta = self.tenant_class(state, class_name, tenants.iter().map(|t| t.name.as_str()))?;

        let mut seen = BTreeSet::new();
        for tenant in &tenants {
            if !seen.insert(tenant.name.as_str()) {
                return Err(SchemaError::validation(format!(
                    "tenant '{}' is listed more than once",
                    tenant.name
                )));
            }
        }

        let nodes = self.live_nodes(state);
        let factor = meta.sharding.replication_factor;
        let mut placements = Vec::new();
        for tenant in tenants {
            if meta.sharding.shard(&tenant.name).is_some() {
                continue;
            }
            let owners = select_owners(&tenant.name, &nodes, factor)?;
            placements.push(TenantPlacement {
                name: tenant.name,
                status: tenant.activity_status,
                nodes: owners,
            });
        }

        if placements.is_empty() {
            return Ok(None);
        }
        Ok(Some(MetaCommand::AddTenants {
            class_name: class_name.to_string(),
            tenants: placements,
        }))
    }

    pub fn parse_update_tenants(
        &self,
        class_name: &str,
        tenants: Vec<Tenant>,
        state: &SchemaState,
    ) -> Result<MetaCommand> {
        let meta = self.tenant_class(state, class_name, tenants.iter().map(|t| t.name.as_str()))?;
        missing_tenants(meta, tenants.iter().map(|t| t.name.as_str()))?;
        Ok(MetaCommand::UpdateTenants {
            class_name: class_name.to_string(),
            tenants,
        })
    }

    pub fn parse_delete_tenants(
        &self,
        class_name: &str,
        tenants: Vec<String>,
        state: &SchemaState,
    ) -> Result<MetaCommand> {
        let meta = self.tenant_class(state, class_name, tenants.iter().map(String::as_str))?;
        missing_tenants(meta, tenants.iter().map(String::as_str))?;
        Ok(MetaCommand::DeleteTenants {
            class_name: class_name.to_string(),
            tenants,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Normalize, default and validate a class that must not exist yet
    fn prepare_new_class(&self, mut class: Class, state: &SchemaState) -> Result<Class> {
        class.name = normalize_class_name(&class.name);
        validate_class_name(&class.name)?;
        if let Some(existing) = state.class_ignore_case(&class.name) {
            return Err(SchemaError::AlreadyExists(format!(
                "class name '{}' already exists as '{}'",
                class.name, existing.class.name
            )));
        }

        self.class_defaults(&mut class);

        validate_properties(&class.name, &class.properties, &|c: &str| {
            state.class(c).is_some()
        })?;
        if let Some(config) = &class.inverted_index_config {
            validate_inverted_index_config(config)?;
        }
        if let Some(config) = &class.vector_index_config {
            validate_vector_index_config(config)?;
        }
        for (name, vector) in &class.vector_config {
            validate_vector_index_config(&vector.vector_index_config)
                .map_err(|e| SchemaError::validation(format!("named vector '{}': {}", name, e)))?;
        }
        if let Some(config) = &class.sharding_config {
            validate_sharding_config(
                config,
                self.settings.max_shards_per_class,
                self.settings.max_virtual_per_physical,
            )?;
        }
        if class.replication_factor() == 0 {
            return Err(ShardingError::ZeroReplication.into());
        }
        Ok(class)
    }

    fn class_defaults(&self, class: &mut Class) {
        for property in &mut class.properties {
            self.property_defaults(property);
        }
        if class.replication_config.is_none() {
            class.replication_config = Some(ReplicationConfig {
                factor: self.settings.default_replication_factor,
            });
        }
        if class.inverted_index_config.is_none() {
            class.inverted_index_config = Some(InvertedIndexConfig::default());
        }
        if !class.multi_tenancy_enabled() && class.sharding_config.is_none() {
            class.sharding_config = Some(ShardingConfig {
                virtual_per_physical: self.settings.virtual_per_physical,
                ..Default::default()
            });
        }
    }

    fn property_defaults(&self, property: &mut Property) {
        property.name = normalize_property_name(&property.name);
        if property.data_type.is_empty() {
            property.data_type = vec![self.settings.default_data_type.clone()];
        }
        for nested in &mut property.nested_properties {
            self.property_defaults(nested);
        }
    }

    /// Class for a tenant request: exists, multi-tenant, names valid, batch
    /// within the configured limit
    fn tenant_class<'a, 'n>(
        &self,
        state: &'a SchemaState,
        class_name: &str,
        names: impl ExactSizeIterator<Item = &'n str>,
    ) -> Result<&'a MetaClass> {
        let meta = existing_class(state, class_name)?;
        if !meta.class.multi_tenancy_enabled() {
            return Err(SchemaError::validation(format!(
                "multi-tenancy is not enabled for class '{}'",
                class_name
            )));
        }
        if names.len() == 0 {
            return Err(SchemaError::validation("no tenants given"));
        }
        if names.len() > self.settings.max_tenants_per_request {
            return Err(SchemaError::validation(format!(
                "too many tenants: {} exceeds the limit of {} per request",
                names.len(),
                self.settings.max_tenants_per_request
            )));
        }
        for name in names {
            validate_tenant_name(name)?;
        }
        Ok(meta)
    }
}

fn existing_class<'a>(state: &'a SchemaState, class_name: &str) -> Result<&'a MetaClass> {
    state
        .class(class_name)
        .ok_or_else(|| SchemaError::not_found(format!("class '{}' not found", class_name)))
}

fn missing_tenants<'n>(meta: &MetaClass, names: impl Iterator<Item = &'n str>) -> Result<()> {
    let missing: Vec<&str> = names.filter(|n| meta.sharding.shard(n).is_none()).collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(SchemaError::not_found(format!(
        "tenants {:?} not found in class '{}'",
        missing, meta.class.name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster_state::MemberDirectory;
    use crate::validator::DefaultValidator;
    use strata_commons::models::{TenantActivityStatus, VectorIndexConfig};
    use strata_raft::{CommandExecutor, DirectExecutor, MetaResponse};
    use strata_commons::models::NodeId;

    fn parser(nodes: &[&str]) -> Parser {
        let directory = MemberDirectory::new(nodes[0], "127.0.0.1:8080");
        for node in &nodes[1..] {
            directory.register(node, "127.0.0.1:8080");
        }
        Parser::new(
            Arc::new(directory),
            Arc::new(DefaultValidator),
            SchemaSettings::default(),
        )
    }

    /// A single-member state with whatever commands applied
    async fn state_with(commands: Vec<MetaCommand>) -> Arc<SchemaState> {
        let executor = DirectExecutor::new(NodeId::new("node1"), "127.0.0.1:8300", "127.0.0.1:8080");
        for cmd in commands {
            let response = executor.execute_meta(cmd).await.unwrap();
            assert!(matches!(response, MetaResponse::Applied { .. }));
        }
        executor.local_state()
    }

    fn article() -> Class {
        Class::new("article").with_property(Property::new("Tags", vec!["text"]))
    }

    #[tokio::test]
    async fn test_add_class_fills_defaults() {
        let parser = parser(&["node1"]);
        let state = state_with(vec![]).await;
        let cmd = parser
            .parse_add_class(
                Class::new("article").with_property(Property::new("Title", vec![])),
                &state,
            )
            .unwrap();

        let MetaCommand::AddClass { class, state: sharding } = cmd else {
            panic!("expected AddClass");
        };
        assert_eq!(class.name, "Article");
        assert_eq!(class.properties[0].name, "title");
        assert_eq!(class.properties[0].data_type, vec!["text"]);
        assert_eq!(class.replication_factor(), 1);
        assert!(class.inverted_index_config.is_some());
        assert_eq!(sharding.count(), 1);
        assert!(sharding.physical.values().all(|p| p.belongs_to_nodes == vec!["node1"]));
    }

    #[tokio::test]
    async fn test_add_class_name_taken_case_insensitive() {
        let parser = parser(&["node1"]);
        let add = parser.parse_add_class(article(), &*state_with(vec![]).await).unwrap();
        let state = state_with(vec![add]).await;

        assert!(matches!(
            parser.parse_add_class(Class::new("ARTICLE"), &state),
            Err(SchemaError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_add_class_replication_needs_nodes() {
        let parser = parser(&["node1"]);
        let state = state_with(vec![]).await;
        let result = parser.parse_add_class(Class::new("Wide").with_replication_factor(3), &state);
        assert!(matches!(result, Err(SchemaError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_placement_ignores_non_members() {
        // node2 is in the directory but has not joined the consensus group
        let parser = parser(&["node1", "node2"]);
        let state = state_with(vec![]).await;
        assert_eq!(parser.live_nodes(&state), vec!["node1"]);
    }

    #[tokio::test]
    async fn test_add_property() {
        let parser = parser(&["node1"]);
        let add = parser.parse_add_class(article(), &*state_with(vec![]).await).unwrap();
        let state = state_with(vec![add]).await;

        let cmd = parser
            .parse_add_property("Article", Property::new("Author", vec!["Article"]), &state)
            .unwrap();
        let MetaCommand::AddProperty { property, .. } = cmd else {
            panic!("expected AddProperty");
        };
        assert_eq!(property.name, "author");

        assert!(matches!(
            parser.parse_add_property("Article", Property::new("TAGS", vec!["int"]), &state),
            Err(SchemaError::AlreadyExists(_))
        ));
        assert!(matches!(
            parser.parse_add_property("Article", Property::new("owner", vec!["Person"]), &state),
            Err(SchemaError::ValidationFailed(_))
        ));
        assert!(matches!(
            parser.parse_add_property("Missing", Property::new("body", vec![]), &state),
            Err(SchemaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_property_data_type_elides_duplicates() {
        let parser = parser(&["node1"]);
        let add = parser.parse_add_class(article(), &*state_with(vec![]).await).unwrap();
        let state = state_with(vec![add]).await;

        let same = parser
            .parse_update_property_data_type("Article", "tags", "text", &state)
            .unwrap();
        assert!(same.is_none());

        let wider = parser
            .parse_update_property_data_type("Article", "tags", "text[]", &state)
            .unwrap();
        assert!(matches!(wider, Some(MetaCommand::UpdatePropertyDataType { .. })));

        assert!(matches!(
            parser.parse_update_property_data_type("article", "tags", "int", &state),
            Err(SchemaError::NotFound(_))
        ));
        assert!(matches!(
            parser.parse_update_property_data_type("Article", "body", "int", &state),
            Err(SchemaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_widened_type_follows_creation_rules() {
        let parser = parser(&["node1"]);
        let add = parser.parse_add_class(article(), &*state_with(vec![]).await).unwrap();
        let state = state_with(vec![add]).await;

        // tags has no nested properties to describe an object
        for nested in ["object", "object[]"] {
            assert!(matches!(
                parser.parse_update_property_data_type("Article", "tags", nested, &state),
                Err(SchemaError::ValidationFailed(_))
            ));
        }
        assert!(matches!(
            parser.parse_update_property_data_type("Article", "tags", "Person", &state),
            Err(SchemaError::ValidationFailed(_))
        ));
        assert!(parser
            .parse_update_property_data_type("Article", "tags", "Article", &state)
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_add_class_sharding_limits() {
        let parser = parser(&["node1"]);
        let state = state_with(vec![]).await;

        let mut huge = Class::new("Huge");
        huge.sharding_config = Some(ShardingConfig {
            desired_count: 1 << 20,
            virtual_per_physical: 1 << 20,
            ..Default::default()
        });
        assert!(matches!(
            parser.parse_add_class(huge, &state),
            Err(SchemaError::ValidationFailed(_))
        ));

        let mut wide = Class::new("Wide");
        wide.sharding_config = Some(ShardingConfig {
            desired_count: 1,
            virtual_per_physical: u32::MAX,
            ..Default::default()
        });
        assert!(matches!(
            parser.parse_add_class(wide, &state),
            Err(SchemaError::ValidationFailed(_))
        ));

        let mut fits = Class::new("Fits");
        fits.sharding_config = Some(ShardingConfig {
            desired_count: 4,
            virtual_per_physical: 16,
            ..Default::default()
        });
        assert!(parser.parse_add_class(fits, &state).is_ok());
    }

    #[tokio::test]
    async fn test_update_class_rules() {
        let parser = parser(&["node1"]);
        let mut class = article();
        class.vector_index_config = Some(VectorIndexConfig {
            dimensions: Some(384),
            ..Default::default()
        });
        let add = parser.parse_add_class(class, &*state_with(vec![]).await).unwrap();
        let state = state_with(vec![add]).await;
        let current = state.read_only_class("Article").unwrap();

        let mut tuned = current.clone();
        tuned.description = Some("news".into());
        if let Some(v) = tuned.vector_index_config.as_mut() {
            v.ef = 128;
        }
        assert!(parser.parse_update_class("Article", tuned, &state).is_ok());

        let mut renamed = current.clone();
        renamed.name = "Story".into();
        assert!(parser.parse_update_class("Article", renamed, &state).is_err());

        let mut toggled = current.clone();
        toggled.multi_tenancy_config = Some(strata_commons::models::MultiTenancyConfig { enabled: true });
        assert!(parser.parse_update_class("Article", toggled, &state).is_err());

        let mut props = current.clone();
        props.properties.push(Property::new("body", vec!["text"]));
        assert!(parser.parse_update_class("Article", props, &state).is_err());

        let mut dims = current.clone();
        if let Some(v) = dims.vector_index_config.as_mut() {
            v.dimensions = Some(768);
        }
        assert!(matches!(
            parser.parse_update_class("Article", dims, &state),
            Err(SchemaError::ValidationFailed(_))
        ));

        assert!(matches!(
            parser.parse_update_class("Missing", current, &state),
            Err(SchemaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tenants_require_multi_tenancy() {
        let parser = parser(&["node1"]);
        let add = parser
            .parse_add_class(Class::new("Widget"), &*state_with(vec![]).await)
            .unwrap();
        let state = state_with(vec![add]).await;
        assert!(matches!(
            parser.parse_add_tenants("Widget", vec![Tenant::new("t1")], &state),
            Err(SchemaError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_tenant_requests() {
        let parser = parser(&["node1"]);
        let add = parser
            .parse_add_class(Class::new("Shop").with_multi_tenancy(true), &*state_with(vec![]).await)
            .unwrap();
        let tenants = parser
            .parse_add_tenants("Shop", vec![Tenant::new("t1")], &*state_with(vec![add.clone()]).await)
            .unwrap()
            .unwrap();
        let state = state_with(vec![add, tenants]).await;

        // existing tenants are skipped
        assert!(parser
            .parse_add_tenants("Shop", vec![Tenant::new("t1")], &state)
            .unwrap()
            .is_none());
        assert!(parser
            .parse_add_tenants("Shop", vec![Tenant::new("t2"), Tenant::new("t2")], &state)
            .is_err());
        assert!(parser
            .parse_add_tenants("Shop", vec![Tenant::new("bad name")], &state)
            .is_err());

        let frozen = Tenant::new("t1").with_status(TenantActivityStatus::Frozen);
        assert!(parser.parse_update_tenants("Shop", vec![frozen], &state).is_ok());
        assert!(matches!(
            parser.parse_update_tenants("Shop", vec![Tenant::new("ghost")], &state),
            Err(SchemaError::NotFound(_))
        ));
        assert!(matches!(
            parser.parse_delete_tenants("Shop", vec!["ghost".into()], &state),
            Err(SchemaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_restore_rejects_unknown_owners() {
        let parser = parser(&["node1"]);
        let nodes = vec!["node7".to_string()];
        let sharding =
            ShardingState::init("Article", ShardingConfig::default(), &nodes, 1).unwrap();
        let state = state_with(vec![]).await;
        assert!(matches!(
            parser.parse_restore_class(article(), sharding, &state),
            Err(SchemaError::ValidationFailed(_))
        ));

        let local = vec!["node1".to_string()];
        let sharding =
            ShardingState::init("Article", ShardingConfig::default(), &local, 1).unwrap();
        assert!(matches!(
            parser.parse_restore_class(article(), sharding, &state),
            Ok(MetaCommand::RestoreClass { .. })
        ));
    }

    #[tokio::test]
    async fn test_shard_status_request() {
        let parser = parser(&["node1"]);
        let add = parser.parse_add_class(article(), &*state_with(vec![]).await).unwrap();
        let state = state_with(vec![add]).await;
        let shard = state
            .class("Article")
            .unwrap()
            .sharding
            .shard_names()
            .next()
            .unwrap()
            .to_string();

        assert!(parser
            .parse_update_shard_status("Article", &shard, "readonly", &state)
            .is_ok());
        assert!(matches!(
            parser.parse_update_shard_status("Article", &shard, "melted", &state),
            Err(SchemaError::ValidationFailed(_))
        ));
        assert!(matches!(
            parser.parse_update_shard_status("Article", "nope", "READY", &state),
            Err(SchemaError::NotFound(_))
        ));
    }
}
