//! Resource-level IAM model: roles bound to sets of identities.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

const ROLE_PREFIX: &str = "roles/";

/// IAM role name, always in `roles/...` form once built through [`Role::of`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Accepts `roles/x`, a custom role path (`projects/../roles/x`), or a bare
    /// name which gets the `roles/` prefix.
    pub fn of(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.contains('/') {
            Self(name)
        } else {
            Self(format!("{ROLE_PREFIX}{name}"))
        }
    }

    pub fn viewer() -> Self {
        Self::of("viewer")
    }

    pub fn data_viewer() -> Self {
        Self::of("bigquery.dataViewer")
    }

    pub fn data_editor() -> Self {
        Self::of("bigquery.dataEditor")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A principal that can be bound to a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Identity {
    AllUsers,
    AllAuthenticatedUsers,
    User(String),
    ServiceAccount(String),
    Group(String),
    Domain(String),
    ProjectOwner(String),
    ProjectEditor(String),
    ProjectViewer(String),
}

impl Identity {
    pub fn user(email: impl Into<String>) -> Self {
        Self::User(email.into())
    }

    pub fn service_account(email: impl Into<String>) -> Self {
        Self::ServiceAccount(email.into())
    }

    pub fn group(email: impl Into<String>) -> Self {
        Self::Group(email.into())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::AllUsers => f.write_str("allUsers"),
            Identity::AllAuthenticatedUsers => f.write_str("allAuthenticatedUsers"),
            Identity::User(v) => write!(f, "user:{v}"),
            Identity::ServiceAccount(v) => write!(f, "serviceAccount:{v}"),
            Identity::Group(v) => write!(f, "group:{v}"),
            Identity::Domain(v) => write!(f, "domain:{v}"),
            Identity::ProjectOwner(v) => write!(f, "projectOwner:{v}"),
            Identity::ProjectEditor(v) => write!(f, "projectEditor:{v}"),
            Identity::ProjectViewer(v) => write!(f, "projectViewer:{v}"),
        }
    }
}

impl FromStr for Identity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allUsers" => return Ok(Identity::AllUsers),
            "allAuthenticatedUsers" => return Ok(Identity::AllAuthenticatedUsers),
            _ => {}
        }
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| format!("identity must look like 'kind:value': {s}"))?;
        if value.is_empty() {
            return Err(format!("identity has an empty value: {s}"));
        }
        let value = value.to_string();
        let identity = match kind {
            "user" => Identity::User(value),
            "serviceAccount" => Identity::ServiceAccount(value),
            "group" => Identity::Group(value),
            "domain" => Identity::Domain(value),
            "projectOwner" => Identity::ProjectOwner(value),
            "projectEditor" => Identity::ProjectEditor(value),
            "projectViewer" => Identity::ProjectViewer(value),
            other => return Err(format!("unknown identity kind: {other}")),
        };
        Ok(identity)
    }
}

impl TryFrom<String> for Identity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_string()
    }
}

/// Access policy of a single table or view.
///
/// `etag` is whatever the service returned on read; writing the policy back
/// with it lets the service reject the write if someone else changed it in
/// between.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Policy {
    pub bindings: BTreeMap<Role, BTreeSet<Identity>>,
    pub etag: Option<String>,
    pub version: u32,
}

impl Policy {
    pub fn new() -> Self {
        Self {
            version: 1,
            ..Self::default()
        }
    }

    /// Returns the policy with `identity` added under `role`. Adding an
    /// existing binding is a no-op.
    pub fn with_identity(mut self, role: Role, identity: Identity) -> Self {
        self.bindings.entry(role).or_default().insert(identity);
        self
    }

    pub fn members(&self, role: &Role) -> Option<&BTreeSet<Identity>> {
        self.bindings.get(role)
    }

    pub fn has_binding(&self, role: &Role, identity: &Identity) -> bool {
        self.bindings
            .get(role)
            .is_some_and(|members| members.contains(identity))
    }
}
