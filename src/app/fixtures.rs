//! Setup and teardown primitives for integration tests against a warehouse.
//!
//! Every operation is a single delegation to the shared [`Warehouse`] handle
//! (two for the read-modify-write grants). Errors are returned exactly as the
//! warehouse reported them; only "not found" on delete is folded into `false`.

use crate::config::DEFAULT_LOCATION;
use crate::domain::dataset::{Acl, AclEntity, AclRole, DatasetInfo};
use crate::domain::error::{Result, WarehouseError};
use crate::domain::ids::{DatasetId, TableId};
use crate::domain::policy::{Identity, Policy, Role};
use crate::domain::ports::Warehouse;
use crate::domain::table::{Schema, TableDefinition, TableInfo, ViewDefinition};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct FixtureHelper {
    warehouse: Arc<dyn Warehouse>,
    location: String,
}

impl FixtureHelper {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            warehouse,
            location: DEFAULT_LOCATION.to_string(),
        }
    }

    /// Location stamped on datasets created by this helper.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn create_dataset(&self, project_id: &str, dataset_name: &str) -> Result<DatasetInfo> {
        let info = DatasetInfo::new(DatasetId::of(project_id, dataset_name))
            .with_location(self.location.clone());
        self.warehouse.create_dataset(&info)
    }

    /// Deletes the dataset together with every table and view in it. Returns
    /// `false` if there was nothing to delete.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn delete_dataset(&self, project_id: &str, dataset_name: &str) -> Result<bool> {
        let id = DatasetId::of(project_id, dataset_name);
        Ok(self.warehouse.delete_dataset(&id, true)?.is_deleted())
    }

    #[tracing::instrument(level = "debug", skip(self, schema), fields(fields = schema.fields.len()))]
    pub fn create_table(
        &self,
        project_id: &str,
        dataset_name: &str,
        table_name: &str,
        schema: Schema,
    ) -> Result<TableInfo> {
        let info = TableInfo::of(
            TableId::of(project_id, dataset_name, table_name),
            TableDefinition::standard(schema),
        );
        self.warehouse.create_table(&info)
    }

    /// Creates a standard-SQL view. Whether the query is checked now or on
    /// first read is up to the warehouse.
    #[tracing::instrument(level = "debug", skip(self, query))]
    pub fn create_view(
        &self,
        project_id: &str,
        dataset_name: &str,
        view_name: &str,
        query: &str,
    ) -> Result<TableInfo> {
        let view = ViewDefinition::new(query).with_legacy_sql(false);
        let info = TableInfo::of(
            TableId::of(project_id, dataset_name, view_name),
            TableDefinition::view(view),
        );
        self.warehouse.create_table(&info)
    }

    /// Views are tables with a view definition, so this deletes either.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn delete_table_or_view(
        &self,
        project_id: &str,
        dataset_name: &str,
        table_name: &str,
    ) -> Result<bool> {
        let id = TableId::of(project_id, dataset_name, table_name);
        Ok(self.warehouse.delete_table(&id)?.is_deleted())
    }

    /// Appends a READER entry for the group `entity_email` to the dataset ACL.
    ///
    /// Read-modify-write without a precondition: a concurrent update between
    /// the read and the write is silently overwritten.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn grant_dataset_access(
        &self,
        project_id: &str,
        dataset_name: &str,
        entity_email: &str,
    ) -> Result<DatasetInfo> {
        let id = DatasetId::of(project_id, dataset_name);
        let mut dataset = self
            .warehouse
            .get_dataset(&id)?
            .ok_or_else(|| WarehouseError::not_found(format!("Dataset {id}")))?;

        dataset
            .access
            .push(Acl::of(AclEntity::group(entity_email), AclRole::Reader));

        self.warehouse.update_dataset(&dataset)
    }

    /// Adds `identity` under `role` to the IAM policy of a table or view.
    ///
    /// The merged policy is written back with the etag it was read with, so a
    /// warehouse that checks etags rejects it with
    /// [`WarehouseError::PreconditionFailed`] if another writer got there first.
    #[tracing::instrument(level = "debug", skip(self, role, identity), fields(%role, %identity))]
    pub fn grant_resource_access(
        &self,
        project_id: &str,
        dataset_name: &str,
        resource_name: &str,
        role: Role,
        identity: Identity,
    ) -> Result<Policy> {
        let id = TableId::of(project_id, dataset_name, resource_name);
        let policy = self
            .warehouse
            .get_iam_policy(&id)?
            .with_identity(role, identity);

        self.warehouse.set_iam_policy(&id, &policy)
    }

    /// Creates a dataset that is deleted, contents included, when the
    /// returned guard is dropped.
    ///
    /// The delete runs synchronously in `Drop`. With a
    /// [`RestWarehouse`](crate::adapters::rest::RestWarehouse) that is a
    /// blocking HTTP call, which panics on an async runtime thread: in a
    /// `#[tokio::test]`, move the guard into `tokio::task::spawn_blocking`
    /// before it goes out of scope.
    pub fn scoped_dataset(&self, project_id: &str, dataset_name: &str) -> Result<ScopedDataset> {
        let info = self.create_dataset(project_id, dataset_name)?;
        Ok(ScopedDataset {
            helper: self.clone(),
            info,
            torn_down: false,
        })
    }
}

/// Dataset name that is unique per call: `{prefix}_{uuid}`.
pub fn unique_dataset_name(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

pub struct ScopedDataset {
    helper: FixtureHelper,
    info: DatasetInfo,
    torn_down: bool,
}

impl ScopedDataset {
    pub fn id(&self) -> &DatasetId {
        &self.info.dataset_id
    }

    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    pub fn project_id(&self) -> &str {
        &self.info.dataset_id.project_id
    }

    pub fn dataset_name(&self) -> &str {
        &self.info.dataset_id.dataset_id
    }

    /// Deletes now and reports the outcome instead of leaving it to `Drop`.
    pub fn teardown(mut self) -> Result<bool> {
        self.torn_down = true;
        self.helper
            .delete_dataset(self.project_id(), self.dataset_name())
    }
}

impl Drop for ScopedDataset {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        if let Err(e) = self
            .helper
            .delete_dataset(self.project_id(), self.dataset_name())
        {
            tracing::warn!(dataset = %self.info.dataset_id, error = %e, "Failed to tear down dataset");
        }
    }
}
