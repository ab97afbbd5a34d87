use crate::domain::dataset::DatasetInfo;
use crate::domain::error::Result;
use crate::domain::ids::{DatasetId, TableId};
use crate::domain::policy::Policy;
use crate::domain::table::TableInfo;
use serde::Serialize;

/// Result of a delete call. Missing resources are not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    pub fn is_deleted(self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// Remote warehouse client handle (implemented by Infrastructure).
///
/// One handle is shared by every caller, so implementations must be safe for
/// concurrent use. No method retries.
pub trait Warehouse: Send + Sync {
    fn create_dataset(&self, info: &DatasetInfo) -> Result<DatasetInfo>;

    fn get_dataset(&self, id: &DatasetId) -> Result<Option<DatasetInfo>>;

    /// Replaces the mutable fields (ACL, description, labels) of an existing
    /// dataset.
    fn update_dataset(&self, info: &DatasetInfo) -> Result<DatasetInfo>;

    /// With `delete_contents`, tables and views inside go too; without it a
    /// non-empty dataset is refused.
    fn delete_dataset(&self, id: &DatasetId, delete_contents: bool) -> Result<DeleteOutcome>;

    fn create_table(&self, info: &TableInfo) -> Result<TableInfo>;

    fn get_table(&self, id: &TableId) -> Result<Option<TableInfo>>;

    fn delete_table(&self, id: &TableId) -> Result<DeleteOutcome>;

    fn get_iam_policy(&self, id: &TableId) -> Result<Policy>;

    /// Writes `policy` as a whole. A policy carrying an etag is only applied
    /// if it still matches the stored one.
    fn set_iam_policy(&self, id: &TableId, policy: &Policy) -> Result<Policy>;
}
