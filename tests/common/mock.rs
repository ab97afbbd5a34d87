//! Mock warehouses for integration tests.
#![allow(dead_code)]

use std::sync::Mutex;

use bq_fixtures::adapters::memory::InMemoryWarehouse;
use bq_fixtures::domain::dataset::DatasetInfo;
use bq_fixtures::domain::error::{Result, WarehouseError};
use bq_fixtures::domain::ids::{DatasetId, TableId};
use bq_fixtures::domain::policy::Policy;
use bq_fixtures::domain::ports::{DeleteOutcome, Warehouse};
use bq_fixtures::domain::table::TableInfo;

/// Warehouse whose every call fails with the given HTTP status.
pub struct FailingWarehouse {
    pub status: u16,
}

impl FailingWarehouse {
    pub fn with_status(status: u16) -> Self {
        Self { status }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(WarehouseError::from_status(
            self.status,
            "injected failure".to_string(),
        ))
    }
}

impl Warehouse for FailingWarehouse {
    fn create_dataset(&self, _info: &DatasetInfo) -> Result<DatasetInfo> {
        self.fail()
    }
    fn get_dataset(&self, _id: &DatasetId) -> Result<Option<DatasetInfo>> {
        self.fail()
    }
    fn update_dataset(&self, _info: &DatasetInfo) -> Result<DatasetInfo> {
        self.fail()
    }
    fn delete_dataset(&self, _id: &DatasetId, _delete_contents: bool) -> Result<DeleteOutcome> {
        self.fail()
    }
    fn create_table(&self, _info: &TableInfo) -> Result<TableInfo> {
        self.fail()
    }
    fn get_table(&self, _id: &TableId) -> Result<Option<TableInfo>> {
        self.fail()
    }
    fn delete_table(&self, _id: &TableId) -> Result<DeleteOutcome> {
        self.fail()
    }
    fn get_iam_policy(&self, _id: &TableId) -> Result<Policy> {
        self.fail()
    }
    fn set_iam_policy(&self, _id: &TableId, _policy: &Policy) -> Result<Policy> {
        self.fail()
    }
}

type Hook = Box<dyn FnOnce(&InMemoryWarehouse) + Send>;

/// In-memory warehouse that runs a one-shot hook right after the next read
/// of a dataset or policy, simulating a writer that sneaks in between the
/// read and the write of a read-modify-write.
pub struct InterleavingWarehouse {
    pub inner: InMemoryWarehouse,
    after_read: Mutex<Option<Hook>>,
}

impl InterleavingWarehouse {
    pub fn new() -> Self {
        Self {
            inner: InMemoryWarehouse::new(),
            after_read: Mutex::new(None),
        }
    }

    pub fn after_next_read(&self, hook: impl FnOnce(&InMemoryWarehouse) + Send + 'static) {
        *self.after_read.lock().unwrap() = Some(Box::new(hook));
    }

    fn fire(&self) {
        let hook = self.after_read.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&self.inner);
        }
    }
}

impl Warehouse for InterleavingWarehouse {
    fn create_dataset(&self, info: &DatasetInfo) -> Result<DatasetInfo> {
        self.inner.create_dataset(info)
    }
    fn get_dataset(&self, id: &DatasetId) -> Result<Option<DatasetInfo>> {
        let out = self.inner.get_dataset(id);
        self.fire();
        out
    }
    fn update_dataset(&self, info: &DatasetInfo) -> Result<DatasetInfo> {
        self.inner.update_dataset(info)
    }
    fn delete_dataset(&self, id: &DatasetId, delete_contents: bool) -> Result<DeleteOutcome> {
        self.inner.delete_dataset(id, delete_contents)
    }
    fn create_table(&self, info: &TableInfo) -> Result<TableInfo> {
        self.inner.create_table(info)
    }
    fn get_table(&self, id: &TableId) -> Result<Option<TableInfo>> {
        self.inner.get_table(id)
    }
    fn delete_table(&self, id: &TableId) -> Result<DeleteOutcome> {
        self.inner.delete_table(id)
    }
    fn get_iam_policy(&self, id: &TableId) -> Result<Policy> {
        let out = self.inner.get_iam_policy(id);
        self.fire();
        out
    }
    fn set_iam_policy(&self, id: &TableId, policy: &Policy) -> Result<Policy> {
        self.inner.set_iam_policy(id, policy)
    }
}
