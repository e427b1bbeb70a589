//! Authorization of schema operations
//!
//! Every handler operation is checked before any validation or state access.
//! Resource paths follow the pattern:
//!
//! - `schema/*`: the whole schema
//! - `schema/objects`: class definitions
//! - `schema/<class>/shards` and `schema/<class>/shards/<shard>`
//! - `schema/<class>/tenants`

use std::fmt;
use std::sync::Arc;

use strata_commons::config::AuthorizationSettings;
use strata_commons::models::Principal;

use crate::error::{Result, SchemaError};

/// Action performed on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }

    /// Verbs that never change state
    #[inline]
    pub fn is_read(&self) -> bool {
        matches!(self, Verb::Get | Verb::List)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource path helpers
pub mod resources {
    pub const ALL: &str = "schema/*";
    pub const OBJECTS: &str = "schema/objects";

    pub fn class(class: &str) -> String {
        format!("schema/{}", class)
    }

    pub fn shards(class: &str) -> String {
        format!("schema/{}/shards", class)
    }

    pub fn shard(class: &str, shard: &str) -> String {
        format!("schema/{}/shards/{}", class, shard)
    }

    pub fn tenants(class: &str) -> String {
        format!("schema/{}/tenants", class)
    }
}

/// Yes/no capability check
pub trait Authorizer: Send + Sync {
    fn authorize(&self, principal: Option<&Principal>, verb: Verb, resource: &str) -> Result<()>;
}

/// Authorization disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _principal: Option<&Principal>, _verb: Verb, _resource: &str) -> Result<()> {
        Ok(())
    }
}

/// Role based authorization from the `[authorization]` config section.
///
/// - **admin users**: every verb on every resource
/// - **read-only users**: `get` and `list`
/// - anyone else, including anonymous callers: denied
#[derive(Debug, Clone, Default)]
pub struct RoleAuthorizer {
    admins: Vec<String>,
    read_only: Vec<String>,
}

impl RoleAuthorizer {
    pub fn new(admins: Vec<String>, read_only: Vec<String>) -> Self {
        Self { admins, read_only }
    }

    fn is_admin(&self, principal: &Principal) -> bool {
        self.admins.iter().any(|name| principal.matches(name))
    }

    fn is_read_only(&self, principal: &Principal) -> bool {
        self.read_only.iter().any(|name| principal.matches(name))
    }
}

impl Authorizer for RoleAuthorizer {
    fn authorize(&self, principal: Option<&Principal>, verb: Verb, resource: &str) -> Result<()> {
        let Some(principal) = principal else {
            return Err(SchemaError::Unauthorized(format!(
                "anonymous access to {} {} denied",
                verb, resource
            )));
        };

        if self.is_admin(principal) || (verb.is_read() && self.is_read_only(principal)) {
            return Ok(());
        }

        log::debug!(
            "Denied {} {} for user '{}'",
            verb,
            resource,
            principal.username
        );
        Err(SchemaError::Unauthorized(format!(
            "user '{}' may not {} {}",
            principal.username, verb, resource
        )))
    }
}

/// Authorizer for the given settings: [`AllowAll`] when disabled
pub fn from_settings(settings: &AuthorizationSettings) -> Arc<dyn Authorizer> {
    if settings.enabled {
        Arc::new(RoleAuthorizer::new(
            settings.admin_users.clone(),
            settings.read_only_users.clone(),
        ))
    } else {
        Arc::new(AllowAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorizer() -> RoleAuthorizer {
        RoleAuthorizer::new(vec!["root".into(), "ops".into()], vec!["viewer".into()])
    }

    #[test]
    fn test_admin_may_do_anything() {
        let root = Principal::new("root");
        assert!(authorizer()
            .authorize(Some(&root), Verb::Delete, &resources::class("Article"))
            .is_ok());

        let member = Principal::new("alice").with_groups(vec!["ops".into()]);
        assert!(authorizer()
            .authorize(Some(&member), Verb::Create, resources::OBJECTS)
            .is_ok());
    }

    #[test]
    fn test_read_only_users() {
        let viewer = Principal::new("viewer");
        let auth = authorizer();
        assert!(auth.authorize(Some(&viewer), Verb::List, resources::ALL).is_ok());
        assert!(matches!(
            auth.authorize(Some(&viewer), Verb::Update, resources::OBJECTS),
            Err(SchemaError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_anonymous_and_unknown_denied() {
        let auth = authorizer();
        assert!(auth.authorize(None, Verb::Get, resources::ALL).is_err());
        let stranger = Principal::new("mallory");
        assert!(auth.authorize(Some(&stranger), Verb::Get, resources::ALL).is_err());
    }

    #[test]
    fn test_disabled_allows_all() {
        let auth = from_settings(&AuthorizationSettings::default());
        assert!(auth.authorize(None, Verb::Delete, resources::ALL).is_ok());
    }

    #[test]
    fn test_resource_paths() {
        assert_eq!(resources::shard("Article", "s1"), "schema/Article/shards/s1");
        assert_eq!(resources::tenants("Shop"), "schema/Shop/tenants");
    }
}
