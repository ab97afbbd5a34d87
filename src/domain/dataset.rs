use crate::domain::ids::{DatasetId, RoutineId, TableId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role of a dataset ACL entry. Besides the three basic roles the service
/// hands back IAM role names (`roles/bigquery.dataViewer`) here; those are
/// kept verbatim so a read-modify-write sends them back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AclRole {
    Reader,
    Writer,
    Owner,
    Other(String),
}

impl AclRole {
    pub fn as_str(&self) -> &str {
        match self {
            AclRole::Reader => "READER",
            AclRole::Writer => "WRITER",
            AclRole::Owner => "OWNER",
            AclRole::Other(name) => name,
        }
    }
}

impl From<String> for AclRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "READER" => AclRole::Reader,
            "WRITER" => AclRole::Writer,
            "OWNER" => AclRole::Owner,
            _ => AclRole::Other(value),
        }
    }
}

impl From<AclRole> for String {
    fn from(role: AclRole) -> Self {
        match role {
            AclRole::Other(name) => name,
            basic => basic.as_str().to_string(),
        }
    }
}

/// Well-known principal sets that may appear in a dataset ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpecialGroup {
    ProjectOwners,
    ProjectWriters,
    ProjectReaders,
    AllAuthenticatedUsers,
}

/// Another dataset whose resources of `target_types` (e.g. `VIEWS`) may read
/// this one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedDataset {
    pub dataset: DatasetId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_types: Vec<String>,
}

/// Grantee of a dataset ACL entry. Serialized as the single key the REST
/// resource uses for that kind of grantee (`groupByEmail`, `view`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AclEntity {
    UserByEmail(String),
    GroupByEmail(String),
    Domain(String),
    SpecialGroup(SpecialGroup),
    IamMember(String),
    /// Authorized view.
    View(TableId),
    Dataset(AuthorizedDataset),
    Routine(RoutineId),
}

impl AclEntity {
    pub fn group(email: impl Into<String>) -> Self {
        Self::GroupByEmail(email.into())
    }

    /// Authorized views, routines and datasets are granted by being listed;
    /// their entries carry no role.
    pub fn takes_role(&self) -> bool {
        !matches!(
            self,
            AclEntity::View(_) | AclEntity::Routine(_) | AclEntity::Dataset(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Acl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AclRole>,
    #[serde(flatten)]
    pub entity: AclEntity,
}

impl Acl {
    pub fn of(entity: AclEntity, role: AclRole) -> Self {
        Self {
            role: Some(role),
            entity,
        }
    }
}

/// Dataset resource as exchanged with the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInfo {
    #[serde(rename = "datasetReference")]
    pub dataset_id: DatasetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub access: Vec<Acl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Assigned by the service; absent on create requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl DatasetInfo {
    pub fn new(dataset_id: DatasetId) -> Self {
        Self {
            dataset_id,
            location: None,
            access: Vec::new(),
            description: None,
            labels: BTreeMap::new(),
            etag: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}
