use serde::{Deserialize, Serialize};

/// Authenticated caller of a schema operation.
///
/// Requests without credentials are represented as `None` by callers rather
/// than by an empty principal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub groups: Vec<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            groups: Vec::new(),
        }
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// True when the principal is the named user or belongs to the named group.
    pub fn matches(&self, name: &str) -> bool {
        self.username == name || self.groups.iter().any(|g| g == name)
    }
}
