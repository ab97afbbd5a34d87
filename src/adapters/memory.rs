//! In-process warehouse with the same observable rules as the remote
//! service. Backs the emulator and unit tests.

use crate::config::DEFAULT_LOCATION;
use crate::domain::dataset::{Acl, AclEntity, AclRole, DatasetInfo, SpecialGroup};
use crate::domain::error::{Result, WarehouseError};
use crate::domain::ids::{DatasetId, TableId};
use crate::domain::policy::Policy;
use crate::domain::ports::{DeleteOutcome, Warehouse};
use crate::domain::table::{TableDefinition, TableInfo};
use crate::domain::validation;
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct TableEntry {
    info: TableInfo,
    policy: Policy,
}

struct DatasetEntry {
    info: DatasetInfo,
    tables: BTreeMap<String, TableEntry>,
}

#[derive(Default)]
struct Store {
    datasets: BTreeMap<DatasetId, DatasetEntry>,
    etag_seq: u64,
}

impl Store {
    fn next_etag(&mut self) -> String {
        self.etag_seq += 1;
        format!("{:016x}", self.etag_seq)
    }

    fn dataset_mut(&mut self, id: &DatasetId) -> Result<&mut DatasetEntry> {
        self.datasets
            .get_mut(id)
            .ok_or_else(|| WarehouseError::not_found(format!("Dataset {id}")))
    }

    fn table(&self, id: &TableId) -> Result<&TableEntry> {
        self.datasets
            .get(&id.dataset())
            .and_then(|ds| ds.tables.get(&id.table_id))
            .ok_or_else(|| WarehouseError::not_found(format!("Table {id}")))
    }

    fn table_mut(&mut self, id: &TableId) -> Result<&mut TableEntry> {
        self.datasets
            .get_mut(&id.dataset())
            .and_then(|ds| ds.tables.get_mut(&id.table_id))
            .ok_or_else(|| WarehouseError::not_found(format!("Table {id}")))
    }
}

#[derive(Default)]
pub struct InMemoryWarehouse {
    store: RwLock<Store>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Store>> {
        self.store.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>> {
        self.store.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> WarehouseError {
    WarehouseError::Service {
        code: 500,
        message: "warehouse state lock poisoned".to_string(),
    }
}

/// ACL the service assigns to a dataset created without one.
fn default_acl() -> Vec<Acl> {
    vec![
        Acl::of(
            AclEntity::SpecialGroup(SpecialGroup::ProjectOwners),
            AclRole::Owner,
        ),
        Acl::of(
            AclEntity::SpecialGroup(SpecialGroup::ProjectWriters),
            AclRole::Writer,
        ),
        Acl::of(
            AclEntity::SpecialGroup(SpecialGroup::ProjectReaders),
            AclRole::Reader,
        ),
    ]
}

/// Validates grantees and drops repeated entries, keeping first-seen order.
fn normalize_acl(access: &[Acl]) -> Result<Vec<Acl>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(access.len());
    for acl in access {
        if acl.role.is_some() != acl.entity.takes_role() {
            return Err(WarehouseError::invalid(format!(
                "Access entry {:?} has an unexpected role setting",
                acl.entity
            )));
        }
        match &acl.entity {
            AclEntity::UserByEmail(email) | AclEntity::GroupByEmail(email) => {
                validation::email(email)?
            }
            AclEntity::Domain(domain) | AclEntity::IamMember(domain) if domain.is_empty() => {
                return Err(WarehouseError::invalid("Access entry has an empty grantee"));
            }
            _ => {}
        }
        if seen.insert(acl) {
            out.push(acl.clone());
        }
    }
    Ok(out)
}

fn validate_definition(definition: &TableDefinition) -> Result<()> {
    match definition {
        TableDefinition::Standard { schema } => validation::schema(schema),
        TableDefinition::View { view } if view.query.trim().is_empty() => {
            Err(WarehouseError::invalid("View query must not be empty"))
        }
        TableDefinition::View { .. } => Ok(()),
    }
}

fn validate_policy(policy: &Policy) -> Result<()> {
    for role in policy.bindings.keys() {
        let name = role.as_str();
        if !(name.starts_with("roles/") || name.contains("/roles/")) {
            return Err(WarehouseError::invalid(format!("Invalid role: {name}")));
        }
    }
    Ok(())
}

impl Warehouse for InMemoryWarehouse {
    fn create_dataset(&self, info: &DatasetInfo) -> Result<DatasetInfo> {
        let id = &info.dataset_id;
        validation::project_id(&id.project_id)?;
        validation::dataset_name(&id.dataset_id)?;

        let access = if info.access.is_empty() {
            default_acl()
        } else {
            normalize_acl(&info.access)?
        };

        let mut store = self.write()?;
        if store.datasets.contains_key(id) {
            return Err(WarehouseError::already_exists(format!("Dataset {id}")));
        }

        let mut stored = info.clone();
        stored.access = access;
        stored.location = Some(
            info.location
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        );
        stored.etag = Some(store.next_etag());

        store.datasets.insert(
            id.clone(),
            DatasetEntry {
                info: stored.clone(),
                tables: BTreeMap::new(),
            },
        );
        tracing::debug!(dataset = %id, "Created dataset");
        Ok(stored)
    }

    fn get_dataset(&self, id: &DatasetId) -> Result<Option<DatasetInfo>> {
        Ok(self.read()?.datasets.get(id).map(|ds| ds.info.clone()))
    }

    fn update_dataset(&self, info: &DatasetInfo) -> Result<DatasetInfo> {
        let access = normalize_acl(&info.access)?;

        let mut store = self.write()?;
        let etag = store.next_etag();
        let entry = store.dataset_mut(&info.dataset_id)?;

        entry.info.access = access;
        entry.info.description = info.description.clone();
        entry.info.labels = info.labels.clone();
        entry.info.etag = Some(etag);
        Ok(entry.info.clone())
    }

    fn delete_dataset(&self, id: &DatasetId, delete_contents: bool) -> Result<DeleteOutcome> {
        let mut store = self.write()?;
        let Some(entry) = store.datasets.get(id) else {
            return Ok(DeleteOutcome::NotFound);
        };
        if !delete_contents && !entry.tables.is_empty() {
            return Err(WarehouseError::invalid(format!(
                "Dataset {id} is still in use"
            )));
        }
        store.datasets.remove(id);
        tracing::debug!(dataset = %id, "Deleted dataset");
        Ok(DeleteOutcome::Deleted)
    }

    fn create_table(&self, info: &TableInfo) -> Result<TableInfo> {
        let id = &info.table_id;
        validation::table_name(&id.table_id)?;
        validate_definition(&info.definition)?;

        let mut store = self.write()?;
        let etag = store.next_etag();
        let policy_etag = store.next_etag();
        let dataset = store.dataset_mut(&id.dataset())?;
        if dataset.tables.contains_key(&id.table_id) {
            return Err(WarehouseError::already_exists(format!("Table {id}")));
        }

        let mut stored = info.clone();
        stored.etag = Some(etag);
        dataset.tables.insert(
            id.table_id.clone(),
            TableEntry {
                info: stored.clone(),
                policy: Policy {
                    etag: Some(policy_etag),
                    ..Policy::new()
                },
            },
        );
        tracing::debug!(table = %id, view = stored.is_view(), "Created table");
        Ok(stored)
    }

    fn get_table(&self, id: &TableId) -> Result<Option<TableInfo>> {
        let store = self.read()?;
        Ok(store
            .datasets
            .get(&id.dataset())
            .and_then(|ds| ds.tables.get(&id.table_id))
            .map(|t| t.info.clone()))
    }

    fn delete_table(&self, id: &TableId) -> Result<DeleteOutcome> {
        let mut store = self.write()?;
        let removed = store
            .datasets
            .get_mut(&id.dataset())
            .and_then(|ds| ds.tables.remove(&id.table_id));
        Ok(match removed {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }

    fn get_iam_policy(&self, id: &TableId) -> Result<Policy> {
        Ok(self.read()?.table(id)?.policy.clone())
    }

    fn set_iam_policy(&self, id: &TableId, policy: &Policy) -> Result<Policy> {
        validate_policy(policy)?;

        let mut store = self.write()?;
        let etag = store.next_etag();
        let table = store.table_mut(id)?;
        if let Some(expected) = &policy.etag
            && table.policy.etag.as_ref() != Some(expected)
        {
            return Err(WarehouseError::PreconditionFailed {
                message: format!("Policy of {id} was modified concurrently"),
            });
        }

        table.policy = Policy {
            bindings: policy.bindings.clone(),
            etag: Some(etag),
            version: policy.version.max(1),
        };
        Ok(table.policy.clone())
    }
}
