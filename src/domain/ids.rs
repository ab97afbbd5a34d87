use serde::{Deserialize, Serialize};
use std::fmt;

/// Dataset address: `(project, dataset)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetId {
    pub project_id: String,
    pub dataset_id: String,
}

impl DatasetId {
    pub fn of(project_id: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
        }
    }

    /// Address of a table or view inside this dataset.
    pub fn table(&self, table_id: impl Into<String>) -> TableId {
        TableId {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
            table_id: table_id.into(),
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_id, self.dataset_id)
    }
}

/// Table or view address: `(project, dataset, table)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableId {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableId {
    pub fn of(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }

    pub fn dataset(&self) -> DatasetId {
        DatasetId::of(self.project_id.clone(), self.dataset_id.clone())
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// Routine address, as it appears in an authorized-routine ACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineId {
    pub project_id: String,
    pub dataset_id: String,
    pub routine_id: String,
}
