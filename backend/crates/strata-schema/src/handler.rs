//! Schema handler
//!
//! Entry point for every schema, sharding, tenant and membership request.
//! Each mutation follows the same path:
//!
//! 1. authorize (before any state is read)
//! 2. take the class lock and read a linearizable snapshot
//! 3. plan the record against that snapshot
//! 4. commit it through the [`CommandExecutor`] and map the apply outcome
//!
//! Reads answering external callers are linearizable. The only local read is
//! [`Handler::get_schema_skip_auth`], reserved for background work.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_commons::config::SchemaSettings;
use strata_commons::constants::DEFAULT_RAFT_PORT;
use strata_commons::models::{
    raft_id_for, Class, ClassInfo, Principal, Property, Schema, ShardStatusInfo, Tenant,
    TenantActivityStatus,
};
use strata_raft::{CommandExecutor, MetaCommand, MetaResponse, SchemaState};
use strata_sharding::ShardingState;
use uuid::Uuid;

use crate::authorizer::{resources, Authorizer, Verb};
use crate::cluster_state::ClusterState;
use crate::error::{Result, SchemaError};
use crate::locks::ClassLocks;
use crate::parser::Parser;
use crate::validator::{normalize_class_name, ConfigValidator};

pub struct Handler {
    executor: Arc<dyn CommandExecutor>,
    authorizer: Arc<dyn Authorizer>,
    cluster_state: Arc<dyn ClusterState>,
    parser: Parser,
    locks: ClassLocks,
}

impl Handler {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        authorizer: Arc<dyn Authorizer>,
        validator: Arc<dyn ConfigValidator>,
        cluster_state: Arc<dyn ClusterState>,
        settings: SchemaSettings,
    ) -> Self {
        let parser = Parser::new(cluster_state.clone(), validator, settings);
        Self {
            executor,
            authorizer,
            cluster_state,
            parser,
            locks: ClassLocks::new(),
        }
    }

    pub fn executor(&self) -> &Arc<dyn CommandExecutor> {
        &self.executor
    }

    // =========================================================================
    // Classes
    // =========================================================================

    /// Create a class. Returns the log index it was applied at.
    pub async fn add_class(&self, principal: Option<&Principal>, class: Class) -> Result<u64> {
        self.authorizer
            .authorize(principal, Verb::Create, resources::OBJECTS)?;

        let _guard = self.locks.lock(&normalize_class_name(&class.name)).await;
        let state = self.executor.linearizable_state().await?;
        let cmd = self.parser.parse_add_class(class, &state)?;
        self.commit(cmd).await
    }

    /// Recreate a class from a backup with its recorded sharding layout
    pub async fn restore_class(
        &self,
        principal: Option<&Principal>,
        class: Class,
        sharding: ShardingState,
    ) -> Result<u64> {
        self.authorizer
            .authorize(principal, Verb::Create, resources::OBJECTS)?;

        let _guard = self.locks.lock(&normalize_class_name(&class.name)).await;
        let state = self.executor.linearizable_state().await?;
        let cmd = self.parser.parse_restore_class(class, sharding, &state)?;
        self.commit(cmd).await
    }

    pub async fn update_class(
        &self,
        principal: Option<&Principal>,
        class_name: &str,
        class: Class,
    ) -> Result<u64> {
        self.authorizer
            .authorize(principal, Verb::Update, resources::OBJECTS)?;

        let _guard = self.locks.lock(class_name).await;
        let state = self.executor.linearizable_state().await?;
        let cmd = self.parser.parse_update_class(class_name, class, &state)?;
        self.commit(cmd).await
    }

    /// Deleting an absent class succeeds without changing anything
    pub async fn delete_class(&self, principal: Option<&Principal>, class_name: &str) -> Result<u64> {
        self.authorizer
            .authorize(principal, Verb::Delete, resources::OBJECTS)?;

        let _guard = self.locks.lock(class_name).await;
        self.commit(MetaCommand::DeleteClass {
            class_name: class_name.to_string(),
        })
        .await
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub async fn add_property(
        &self,
        principal: Option<&Principal>,
        class_name: &str,
        property: Property,
    ) -> Result<u64> {
        self.authorizer
            .authorize(principal, Verb::Update, resources::OBJECTS)?;

        let _guard = self.locks.lock(class_name).await;
        let state = self.executor.linearizable_state().await?;
        let cmd = self.parser.parse_add_property(class_name, property, &state)?;
        self.commit(cmd).await
    }

    /// Append `data_type` to a property.
    ///
    /// A type the property already has is a no-op and nothing is proposed.
    /// Commit failures are returned to the caller.
    pub async fn update_property_add_data_type(
        &self,
        principal: Option<&Principal>,
        class_name: &str,
        property_name: &str,
        data_type: &str,
    ) -> Result<()> {
        self.authorizer
            .authorize(principal, Verb::Update, resources::OBJECTS)?;

        let _guard = self.locks.lock(class_name).await;
        let state = self.executor.linearizable_state().await?;
        let Some(cmd) = self.parser.parse_update_property_data_type(
            class_name,
            property_name,
            data_type,
            &state,
        )?
        else {
            log::debug!(
                "{}.{} already has data type '{}'",
                class_name,
                property_name,
                data_type
            );
            return Ok(());
        };
        self.commit(cmd).await.map(|_| ())
    }

    // =========================================================================
    // Shards and tenants
    // =========================================================================

    pub async fn update_shard_status(
        &self,
        principal: Option<&Principal>,
        class_name: &str,
        shard_name: &str,
        status: &str,
    ) -> Result<u64> {
        self.authorizer.authorize(
            principal,
            Verb::Update,
            &resources::shard(class_name, shard_name),
        )?;

        let _guard = self.locks.lock(class_name).await;
        let state = self.executor.linearizable_state().await?;
        let cmd = self
            .parser
            .parse_update_shard_status(class_name, shard_name, status, &state)?;
        self.commit(cmd).await
    }

    /// Create tenants. Tenants that already exist are skipped; when none is
    /// new the current applied index is returned and nothing is proposed.
    pub async fn add_tenants(
        &self,
        principal: Option<&Principal>,
        class_name: &str,
        tenants: Vec<Tenant>,
    ) -> Result<u64> {
        self.authorizer
            .authorize(principal, Verb::Create, &resources::tenants(class_name))?;

        let _guard = self.locks.lock(class_name).await;
        let state = self.executor.linearizable_state().await?;
        match self.parser.parse_add_tenants(class_name, tenants, &state)? {
            Some(cmd) => self.commit(cmd).await,
            None => Ok(state.applied_index()),
        }
    }

    pub async fn update_tenants(
        &self,
        principal: Option<&Principal>,
        class_name: &str,
        tenants: Vec<Tenant>,
    ) -> Result<u64> {
        self.authorizer
            .authorize(principal, Verb::Update, &resources::tenants(class_name))?;

        let _guard = self.locks.lock(class_name).await;
        let state = self.executor.linearizable_state().await?;
        let cmd = self.parser.parse_update_tenants(class_name, tenants, &state)?;
        self.commit(cmd).await
    }

    pub async fn delete_tenants(
        &self,
        principal: Option<&Principal>,
        class_name: &str,
        tenants: Vec<String>,
    ) -> Result<u64> {
        self.authorizer
            .authorize(principal, Verb::Delete, &resources::tenants(class_name))?;

        let _guard = self.locks.lock(class_name).await;
        let state = self.executor.linearizable_state().await?;
        let cmd = self.parser.parse_delete_tenants(class_name, tenants, &state)?;
        self.commit(cmd).await
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Add `node` to the consensus group.
    ///
    /// The node must be resolvable through the cluster directory; its
    /// consensus address is the resolved host with `port`, or
    /// [`DEFAULT_RAFT_PORT`] when no port is given.
    pub async fn join_node(&self, node: &str, port: Option<&str>, voter: bool) -> Result<()> {
        let addr = self.cluster_state.node_hostname(node).ok_or_else(|| {
            SchemaError::Unreachable(format!("could not resolve addr for node id {}", node))
        })?;
        let host = addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr.as_str());

        let port = match port.filter(|p| !p.is_empty()) {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| SchemaError::validation(format!("invalid port '{}'", p)))?,
            None => DEFAULT_RAFT_PORT,
        };
        let rpc_addr = format!("{}:{}", host, port);

        let state = self.executor.linearizable_state().await?;
        if let Some(existing) = state.member_by_raft_id(raft_id_for(node)) {
            if existing.name != node {
                return Err(SchemaError::AlreadyExists(format!(
                    "node '{}' collides with member '{}'",
                    node, existing.name
                )));
            }
        }

        self.executor.join_node(node, &rpc_addr, &addr, voter).await?;
        log::info!(
            "Node '{}' joined at {} ({})",
            node,
            rpc_addr,
            if voter { "voter" } else { "learner" }
        );
        Ok(())
    }

    /// Remove `node` from the consensus group. Shards it owns keep it as an
    /// owner until they are reassigned.
    pub async fn remove_node(&self, node: &str) -> Result<()> {
        self.executor.remove_node(node).await?;
        log::info!("Node '{}' removed from the cluster", node);
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_schema(&self, principal: Option<&Principal>) -> Result<Schema> {
        self.authorizer.authorize(principal, Verb::List, resources::ALL)?;
        self.read_only_schema().await
    }

    /// Local projection, no authorization and no freshness guarantee. Never
    /// use it to answer a user request.
    pub fn get_schema_skip_auth(&self) -> Schema {
        self.executor.local_state().read_only_schema()
    }

    pub async fn read_only_schema(&self) -> Result<Schema> {
        Ok(self.state().await?.read_only_schema())
    }

    pub async fn read_only_class(&self, class_name: &str) -> Result<Option<Class>> {
        Ok(self.state().await?.read_only_class(class_name))
    }

    pub async fn class_info(&self, class_name: &str) -> Result<ClassInfo> {
        Ok(self.state().await?.class_info(class_name))
    }

    pub async fn copy_sharding_state(&self, class_name: &str) -> Result<Option<ShardingState>> {
        Ok(self.state().await?.copy_sharding_state(class_name))
    }

    pub async fn shard_replicas(&self, class_name: &str, shard_name: &str) -> Result<Vec<String>> {
        self.state()
            .await?
            .shard_replicas(class_name, shard_name)
            .ok_or_else(|| shard_not_found(class_name, shard_name))
    }

    pub async fn shard_owner(&self, class_name: &str, shard_name: &str) -> Result<String> {
        self.state()
            .await?
            .shard_owner(class_name, shard_name)
            .ok_or_else(|| shard_not_found(class_name, shard_name))
    }

    /// Shard of object `id` in a class without multi-tenancy
    pub async fn shard_from_uuid(&self, class_name: &str, id: &Uuid) -> Result<String> {
        self.state()
            .await?
            .shard_from_uuid(class_name, id)
            .ok_or_else(|| {
                SchemaError::not_found(format!(
                    "no shard for object {} in class '{}'",
                    id, class_name
                ))
            })
    }

    /// Shard and activity status of a tenant, `None` when the tenant does not
    /// exist
    pub async fn tenant_shard(
        &self,
        class_name: &str,
        tenant: &str,
    ) -> Result<Option<(String, TenantActivityStatus)>> {
        Ok(self.state().await?.tenant_shard(class_name, tenant))
    }

    pub async fn get_tenants(
        &self,
        principal: Option<&Principal>,
        class_name: &str,
    ) -> Result<Vec<Tenant>> {
        self.authorizer
            .authorize(principal, Verb::Get, &resources::tenants(class_name))?;
        self.state()
            .await?
            .tenants(class_name)
            .ok_or_else(|| class_not_found(class_name))
    }

    pub async fn shards_status(
        &self,
        principal: Option<&Principal>,
        class_name: &str,
    ) -> Result<Vec<ShardStatusInfo>> {
        self.authorizer
            .authorize(principal, Verb::List, &resources::shards(class_name))?;
        self.state()
            .await?
            .shards_status(class_name)
            .ok_or_else(|| class_not_found(class_name))
    }

    pub fn nodes(&self) -> Vec<String> {
        self.cluster_state.all_names()
    }

    pub fn node_name(&self) -> String {
        self.cluster_state.local_name()
    }

    /// Diagnostic counters. No consistency guarantee.
    pub fn stats(&self) -> BTreeMap<String, String> {
        let cluster = self.executor.stats();
        let state = self.executor.local_state();

        let mut stats = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            stats.insert(key.to_string(), value);
        };
        put("node_name", cluster.node_name.clone());
        put("raft_id", cluster.raft_id.to_string());
        put("state", cluster.state.clone());
        put("is_leader", cluster.is_leader().to_string());
        put(
            "leader",
            cluster
                .current_leader
                .map(|id| id.to_string())
                .unwrap_or_default(),
        );
        put("term", cluster.current_term.to_string());
        put(
            "last_log_index",
            cluster
                .last_log_index
                .map(|i| i.to_string())
                .unwrap_or_default(),
        );
        put("last_applied_index", cluster.last_applied_index.to_string());
        put("voters", cluster.voters.to_string());
        put("learners", cluster.learners.to_string());
        put("cluster_mode", self.executor.is_cluster_mode().to_string());
        put("classes", state.class_count().to_string());
        put("shards", state.shard_count().to_string());
        put("tenants", state.tenant_count().to_string());
        put("state_size", cluster.state_size.to_string());
        put("applied_entries", cluster.applied_entries.to_string());
        put("rejected_entries", cluster.rejected_entries.to_string());
        stats
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn state(&self) -> Result<Arc<SchemaState>> {
        Ok(self.executor.linearizable_state().await?)
    }

    /// Commit a planned record; apply-time rejections become errors
    async fn commit(&self, cmd: MetaCommand) -> Result<u64> {
        let kind = cmd.kind();
        let class_name = cmd.class_name().to_string();

        match self.executor.execute_meta(cmd).await? {
            MetaResponse::Applied { version } | MetaResponse::Unchanged { version } => {
                log::debug!("{} '{}' committed at {}", kind, class_name, version);
                Ok(version)
            }
            MetaResponse::Rejected {
                kind: rejection,
                message,
            } => {
                log::warn!("{} '{}' rejected at apply: {}", kind, class_name, message);
                Err(SchemaError::from_rejection(rejection, message))
            }
        }
    }
}

fn class_not_found(class_name: &str) -> SchemaError {
    SchemaError::not_found(format!("class '{}' not found", class_name))
}

fn shard_not_found(class_name: &str, shard_name: &str) -> SchemaError {
    SchemaError::not_found(format!(
        "shard '{}' not found in class '{}'",
        shard_name, class_name
    ))
}
