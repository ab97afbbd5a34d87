//! Fixture helper behaviour against the in-memory warehouse.

mod common;

use std::sync::Arc;

use bq_fixtures::adapters::memory::InMemoryWarehouse;
use bq_fixtures::app::fixtures::{FixtureHelper, unique_dataset_name};
use bq_fixtures::domain::dataset::{Acl, AclEntity, AclRole};
use bq_fixtures::domain::error::WarehouseError;
use bq_fixtures::domain::ids::{DatasetId, TableId};
use bq_fixtures::domain::policy::{Identity, Role};
use bq_fixtures::domain::ports::Warehouse;

use common::mock::{FailingWarehouse, InterleavingWarehouse};
use common::{PROJECT, one_string_field};

fn setup() -> (Arc<InMemoryWarehouse>, FixtureHelper) {
    let warehouse = Arc::new(InMemoryWarehouse::new());
    let helper = FixtureHelper::new(warehouse.clone());
    (warehouse, helper)
}

#[test]
fn test_dataset_table_lifecycle_scenario() {
    let (_, helper) = setup();

    let dataset = helper.create_dataset("proj", "ds1").unwrap();
    assert_eq!(dataset.dataset_id, DatasetId::of("proj", "ds1"));
    assert_eq!(dataset.location.as_deref(), Some("US"));

    let table = helper
        .create_table("proj", "ds1", "t1", one_string_field())
        .unwrap();
    assert!(!table.is_view());
    assert_eq!(table.schema(), Some(&one_string_field()));

    assert!(helper.delete_table_or_view("proj", "ds1", "t1").unwrap());
    assert!(helper.delete_dataset("proj", "ds1").unwrap());
}

#[test]
fn test_create_then_delete_dataset_leaves_nothing() {
    let (warehouse, helper) = setup();
    let name = unique_dataset_name("roundtrip");

    helper.create_dataset(PROJECT, &name).unwrap();
    assert!(helper.delete_dataset(PROJECT, &name).unwrap());
    assert!(
        warehouse
            .get_dataset(&DatasetId::of(PROJECT, &name))
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_delete_missing_resources_returns_false() {
    let (_, helper) = setup();
    assert!(!helper.delete_dataset(PROJECT, "never_created").unwrap());
    assert!(!helper.delete_table_or_view(PROJECT, "never_created", "t1").unwrap());

    helper.create_dataset(PROJECT, "ds1").unwrap();
    assert!(!helper.delete_table_or_view(PROJECT, "ds1", "t1").unwrap());
}

#[test]
fn test_delete_dataset_cascades_to_tables_and_views() {
    let (warehouse, helper) = setup();
    helper.create_dataset(PROJECT, "ds1").unwrap();
    helper
        .create_table(PROJECT, "ds1", "t1", one_string_field())
        .unwrap();
    helper
        .create_view(PROJECT, "ds1", "v1", "SELECT name FROM `proj.ds1.t1`")
        .unwrap();

    assert!(helper.delete_dataset(PROJECT, "ds1").unwrap());
    assert!(
        warehouse
            .get_table(&TableId::of(PROJECT, "ds1", "v1"))
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_view_is_retrievable_as_standard_sql_view() {
    let (warehouse, helper) = setup();
    let query = "SELECT name FROM `proj.ds1.t1` WHERE name IS NOT NULL";
    helper.create_dataset(PROJECT, "ds1").unwrap();
    helper.create_view(PROJECT, "ds1", "v1", query).unwrap();

    let fetched = warehouse
        .get_table(&TableId::of(PROJECT, "ds1", "v1"))
        .unwrap()
        .expect("view exists");
    let view = fetched.view().expect("stored as a view");
    assert_eq!(view.query, query);
    assert!(!view.use_legacy_sql);
    assert!(fetched.schema().is_none());

    assert!(helper.delete_table_or_view(PROJECT, "ds1", "v1").unwrap());
}

#[test]
fn test_create_errors_are_surfaced_unchanged() {
    let (_, helper) = setup();
    helper.create_dataset(PROJECT, "ds1").unwrap();

    assert!(matches!(
        helper.create_dataset(PROJECT, "ds1"),
        Err(WarehouseError::AlreadyExists { .. })
    ));
    assert!(matches!(
        helper.create_table(PROJECT, "missing", "t1", one_string_field()),
        Err(WarehouseError::NotFound { .. })
    ));

    helper
        .create_table(PROJECT, "ds1", "t1", one_string_field())
        .unwrap();
    assert!(matches!(
        helper.create_table(PROJECT, "ds1", "t1", one_string_field()),
        Err(WarehouseError::AlreadyExists { .. })
    ));
    assert!(matches!(
        helper.create_view(PROJECT, "ds1", "t1", "SELECT 1"),
        Err(WarehouseError::AlreadyExists { .. })
    ));
    assert!(matches!(
        helper.create_dataset(PROJECT, "bad-name"),
        Err(WarehouseError::InvalidArgument { .. })
    ));
}

#[test]
fn test_grant_dataset_access_accumulates_distinct_groups() {
    let (_, helper) = setup();
    let original = helper.create_dataset(PROJECT, "ds1").unwrap().access;

    let emails = ["a@example.com", "b@example.com", "c@example.com"];
    let mut last = None;
    for email in emails {
        last = Some(helper.grant_dataset_access(PROJECT, "ds1", email).unwrap());
    }
    let access = last.unwrap().access;

    assert_eq!(access.len(), original.len() + emails.len());
    for entry in &original {
        assert!(access.contains(entry));
    }
    for email in emails {
        assert!(access.contains(&Acl::of(AclEntity::group(email), AclRole::Reader)));
    }
}

#[test]
fn test_repeated_dataset_grant_is_deduplicated() {
    let (_, helper) = setup();
    let original = helper.create_dataset(PROJECT, "ds1").unwrap().access;

    helper
        .grant_dataset_access(PROJECT, "ds1", "team@example.com")
        .unwrap();
    let updated = helper
        .grant_dataset_access(PROJECT, "ds1", "team@example.com")
        .unwrap();

    assert_eq!(updated.access.len(), original.len() + 1);
}

#[test]
fn test_grant_dataset_access_failures() {
    let (_, helper) = setup();
    assert!(matches!(
        helper.grant_dataset_access(PROJECT, "missing", "team@example.com"),
        Err(WarehouseError::NotFound { .. })
    ));

    helper.create_dataset(PROJECT, "ds1").unwrap();
    assert!(matches!(
        helper.grant_dataset_access(PROJECT, "ds1", "not an email"),
        Err(WarehouseError::InvalidArgument { .. })
    ));
}

#[test]
fn test_grant_resource_access_is_visible_on_fetch() {
    let (warehouse, helper) = setup();
    helper.create_dataset(PROJECT, "ds1").unwrap();
    helper
        .create_table(PROJECT, "ds1", "t1", one_string_field())
        .unwrap();

    let alice = Identity::user("alice@example.com");
    let team = Identity::group("team@example.com");
    helper
        .grant_resource_access(PROJECT, "ds1", "t1", Role::data_viewer(), alice.clone())
        .unwrap();
    let written = helper
        .grant_resource_access(PROJECT, "ds1", "t1", Role::data_viewer(), team.clone())
        .unwrap();

    let fetched = warehouse
        .get_iam_policy(&TableId::of(PROJECT, "ds1", "t1"))
        .unwrap();
    assert_eq!(fetched, written);
    assert!(fetched.has_binding(&Role::data_viewer(), &alice));
    assert!(fetched.has_binding(&Role::data_viewer(), &team));
}

#[test]
fn test_grant_resource_access_on_missing_resource() {
    let (_, helper) = setup();
    helper.create_dataset(PROJECT, "ds1").unwrap();
    let err = helper
        .grant_resource_access(
            PROJECT,
            "ds1",
            "nope",
            Role::data_viewer(),
            Identity::user("a@example.com"),
        )
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_concurrent_dataset_grant_loses_update() {
    let warehouse = Arc::new(InterleavingWarehouse::new());
    let helper = FixtureHelper::new(warehouse.clone());
    helper.create_dataset(PROJECT, "ds1").unwrap();

    warehouse.after_next_read(|inner| {
        let id = DatasetId::of(PROJECT, "ds1");
        let mut info = inner.get_dataset(&id).unwrap().unwrap();
        info.access
            .push(Acl::of(AclEntity::group("other@example.com"), AclRole::Reader));
        inner.update_dataset(&info).unwrap();
    });

    let updated = helper
        .grant_dataset_access(PROJECT, "ds1", "mine@example.com")
        .unwrap();

    assert!(updated.access.contains(&Acl::of(AclEntity::group("mine@example.com"), AclRole::Reader)));
    assert!(!updated.access.contains(&Acl::of(AclEntity::group("other@example.com"), AclRole::Reader)));
}

#[test]
fn test_concurrent_policy_grant_is_rejected_by_etag() {
    let warehouse = Arc::new(InterleavingWarehouse::new());
    let helper = FixtureHelper::new(warehouse.clone());
    helper.create_dataset(PROJECT, "ds1").unwrap();
    helper
        .create_table(PROJECT, "ds1", "t1", one_string_field())
        .unwrap();

    warehouse.after_next_read(|inner| {
        let id = TableId::of(PROJECT, "ds1", "t1");
        let policy = inner
            .get_iam_policy(&id)
            .unwrap()
            .with_identity(Role::data_editor(), Identity::user("other@example.com"));
        inner.set_iam_policy(&id, &policy).unwrap();
    });

    let err = helper
        .grant_resource_access(
            PROJECT,
            "ds1",
            "t1",
            Role::data_viewer(),
            Identity::user("mine@example.com"),
        )
        .unwrap_err();
    assert!(matches!(err, WarehouseError::PreconditionFailed { .. }));
}

#[test]
fn test_service_errors_propagate_from_every_operation() {
    let helper = FixtureHelper::new(Arc::new(FailingWarehouse::with_status(403)));
    let denied = |r: Result<(), WarehouseError>| {
        assert!(matches!(r, Err(WarehouseError::PermissionDenied { .. })), "{r:?}");
    };

    denied(helper.create_dataset(PROJECT, "ds1").map(drop));
    denied(helper.delete_dataset(PROJECT, "ds1").map(drop));
    denied(helper.create_table(PROJECT, "ds1", "t1", one_string_field()).map(drop));
    denied(helper.create_view(PROJECT, "ds1", "v1", "SELECT 1").map(drop));
    denied(helper.delete_table_or_view(PROJECT, "ds1", "t1").map(drop));
    denied(helper.grant_dataset_access(PROJECT, "ds1", "a@example.com").map(drop));
    denied(
        helper
            .grant_resource_access(PROJECT, "ds1", "t1", Role::viewer(), Identity::AllUsers)
            .map(drop),
    );
}

#[test]
fn test_shared_helper_across_threads() {
    let (warehouse, helper) = setup();

    std::thread::scope(|s| {
        for i in 0..8 {
            let helper = helper.clone();
            s.spawn(move || {
                let name = format!("ds_{i}");
                helper.create_dataset(PROJECT, &name).unwrap();
                helper
                    .create_table(PROJECT, &name, "t1", one_string_field())
                    .unwrap();
            });
        }
    });

    for i in 0..8 {
        let id = DatasetId::of(PROJECT, format!("ds_{i}"));
        assert!(warehouse.get_table(&id.table("t1")).unwrap().is_some());
    }
}
