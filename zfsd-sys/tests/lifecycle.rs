// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use zfsd_sys::testing::FakeZfs;
use zfsd_sys::{
    DatasetLifecycle, DatasetRepository, DatasetSchema, Decoding, Operation, OutputShape, ZfsError,
};
use zfsd_types::{
    CloneRequest, DatasetType, DestroyRequest, ListType, PropertySet, RollbackRequest, SetRequest,
    SnapshotRequest,
};

fn pool() -> Arc<FakeZfs> {
    let fake = FakeZfs::new();
    fake.add_filesystem("tank");
    fake.add_filesystem("tank/home");
    fake.add_filesystem("tank/home/alice");
    fake.add_volume("tank/vm", 1 << 30);
    fake.add_snapshot("tank/home@monday");
    Arc::new(fake)
}

fn lifecycle(fake: &Arc<FakeZfs>, shape: OutputShape) -> DatasetLifecycle {
    DatasetLifecycle::new(DatasetRepository::new(
        fake.clone(),
        "zfs",
        Arc::new(DatasetSchema::new(shape, Decoding::Lenient)),
    ))
}

fn properties(pairs: &[(&str, &str)]) -> PropertySet {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn set_then_get_reflects_new_values() {
    let fake = pool();
    let lifecycle = lifecycle(&fake, OutputShape::PropertyRows);

    let updated = lifecycle
        .set(&SetRequest {
            name: "tank/home".into(),
            properties: properties(&[("compression", "lz4"), ("quota", "4096")]),
        })
        .expect("set succeeds");
    assert_eq!(updated.compression, "lz4");
    assert_eq!(updated.quota, Some(4096));

    let fetched = lifecycle.repository().get("tank/home").expect("get");
    assert_eq!(fetched, updated);
    assert_eq!(fake.calls_to("set").len(), 1);
}

#[test]
fn list_partitions_datasets_by_type() {
    for shape in [OutputShape::PropertyRows, OutputShape::Columns] {
        let fake = pool();
        let repository = lifecycle(&fake, shape);
        let repository = repository.repository();

        let all = repository.list(ListType::All, None).expect("list all");
        let mut by_type = 0;
        for list_type in [ListType::Filesystem, ListType::Volume, ListType::Snapshot] {
            let subset = repository.list(list_type, None).expect("typed list");
            assert!(subset.iter().all(|dataset| list_type.matches(dataset.dataset_type)));
            by_type += subset.len();
        }
        assert_eq!(by_type, all.len(), "shape {shape:?}");
    }
}

#[test]
fn snapshot_creates_snapshot_record() {
    let fake = pool();
    let lifecycle = lifecycle(&fake, OutputShape::PropertyRows);

    let snapshot = lifecycle
        .snapshot(&SnapshotRequest {
            name: "tank/home".into(),
            snapshot: "tuesday".into(),
            recursive: false,
        })
        .expect("snapshot succeeds");

    assert_eq!(snapshot.name, "tank/home@tuesday");
    assert_eq!(snapshot.dataset_type, Some(DatasetType::Snapshot));
    assert_eq!(snapshot.origin, "");
    assert!(!fake.exists("tank/home/alice@tuesday"));
}

#[test]
fn recursive_snapshot_covers_descendants() {
    let fake = pool();
    lifecycle(&fake, OutputShape::Columns)
        .snapshot(&SnapshotRequest {
            name: "tank/home".into(),
            snapshot: "nightly".into(),
            recursive: true,
        })
        .expect("recursive snapshot");

    assert!(fake.exists("tank/home/alice@nightly"));
    assert_eq!(
        fake.calls_to("snapshot")[0].args,
        ["snapshot", "-r", "tank/home@nightly"]
    );
}

#[test]
fn clone_records_origin_and_applies_properties() {
    let fake = pool();
    let clone = lifecycle(&fake, OutputShape::PropertyRows)
        .clone_snapshot(&CloneRequest {
            name: "tank/home".into(),
            snapshot: "monday".into(),
            target: "tank/restore".into(),
            properties: properties(&[("mountpoint", "/restore")]),
        })
        .expect("clone succeeds");

    assert_eq!(clone.name, "tank/restore");
    assert_eq!(clone.origin, "tank/home@monday");
    assert_eq!(clone.mountpoint, "/restore");
    assert!(clone.is_clone());
    assert_eq!(
        fake.calls_to("clone")[0].args,
        ["clone", "-o", "mountpoint=/restore", "tank/home@monday", "tank/restore"]
    );
}

#[test]
fn clone_of_non_snapshot_never_runs_clone() {
    let fake = pool();
    // A dataset whose name looks like a snapshot but reports another type
    fake.add_filesystem("tank/home@odd");
    fake.set_property("tank/home@odd", "type", "filesystem");

    let error = lifecycle(&fake, OutputShape::PropertyRows)
        .clone_snapshot(&CloneRequest {
            name: "tank/home".into(),
            snapshot: "odd".into(),
            target: "tank/copy".into(),
            properties: PropertySet::new(),
        })
        .expect_err("precondition fails");

    assert!(matches!(error, ZfsError::Precondition(_)));
    assert!(fake.calls_to("clone").is_empty());
    assert!(!fake.exists("tank/copy"));
}

#[test]
fn rollback_to_missing_snapshot_is_not_found() {
    let fake = pool();
    let error = lifecycle(&fake, OutputShape::PropertyRows)
        .rollback(&RollbackRequest {
            name: "tank/home".into(),
            snapshot: "never".into(),
            recursive: false,
        })
        .expect_err("missing snapshot");

    assert!(matches!(error, ZfsError::NotFound(name) if name == "tank/home@never"));
    assert!(fake.calls_to("rollback").is_empty());
}

#[test]
fn set_on_missing_dataset_is_not_found() {
    let fake = pool();
    let error = lifecycle(&fake, OutputShape::PropertyRows)
        .set(&SetRequest {
            name: "tank/gone".into(),
            properties: properties(&[("compression", "lz4")]),
        })
        .expect_err("missing dataset");

    assert!(matches!(error, ZfsError::NotFound(name) if name == "tank/gone"));
    assert!(fake.calls_to("set").is_empty());
}

#[test]
fn snapshot_of_missing_dataset_is_not_found() {
    let fake = pool();
    let error = lifecycle(&fake, OutputShape::Columns)
        .snapshot(&SnapshotRequest {
            name: "tank/gone".into(),
            snapshot: "tuesday".into(),
            recursive: true,
        })
        .expect_err("missing dataset");

    assert!(matches!(error, ZfsError::NotFound(name) if name == "tank/gone"));
    assert!(fake.calls_to("snapshot").is_empty());
    assert!(!fake.exists("tank/gone@tuesday"));
}

#[test]
fn destroy_of_missing_dataset_is_not_found() {
    let fake = pool();
    let error = lifecycle(&fake, OutputShape::PropertyRows)
        .destroy(&DestroyRequest {
            name: "tank/gone".into(),
            recursive: true,
        })
        .expect_err("missing dataset");

    assert!(matches!(error, ZfsError::NotFound(name) if name == "tank/gone"));
    assert!(fake.calls_to("destroy").is_empty());
}

#[test]
fn clone_of_missing_snapshot_is_not_found() {
    let fake = pool();
    let error = lifecycle(&fake, OutputShape::PropertyRows)
        .clone_snapshot(&CloneRequest {
            name: "tank/home".into(),
            snapshot: "never".into(),
            target: "tank/restore".into(),
            properties: PropertySet::new(),
        })
        .expect_err("missing snapshot");

    assert!(matches!(error, ZfsError::NotFound(name) if name == "tank/home@never"));
    assert!(fake.calls_to("clone").is_empty());
    assert!(!fake.exists("tank/restore"));
}

#[test]
fn rollback_returns_refreshed_dataset() {
    let fake = pool();
    let dataset = lifecycle(&fake, OutputShape::PropertyRows)
        .rollback(&RollbackRequest {
            name: "tank/home".into(),
            snapshot: "monday".into(),
            recursive: false,
        })
        .expect("rollback succeeds");

    assert_eq!(dataset.name, "tank/home");
    assert_eq!(fake.calls_to("rollback")[0].args, ["rollback", "tank/home@monday"]);
}

#[test]
fn destroy_returns_pre_destroy_record() {
    let fake = pool();
    let destroyed = lifecycle(&fake, OutputShape::PropertyRows)
        .destroy(&DestroyRequest {
            name: "tank/vm".into(),
            recursive: false,
        })
        .expect("destroy succeeds");

    assert_eq!(destroyed.name, "tank/vm");
    assert_eq!(destroyed.volume_size, Some(1 << 30));
    assert!(!fake.exists("tank/vm"));
    assert_eq!(fake.calls_to("destroy")[0].args, ["destroy", "tank/vm"]);
}

#[test]
fn recursive_destroy_passes_flag() {
    let fake = pool();
    lifecycle(&fake, OutputShape::Columns)
        .destroy(&DestroyRequest {
            name: "tank/home".into(),
            recursive: true,
        })
        .expect("recursive destroy");

    assert_eq!(fake.calls_to("destroy")[0].args, ["destroy", "-r", "tank/home"]);
    assert_eq!(fake.dataset_names(), ["tank", "tank/vm"]);
}

#[test]
fn failed_mutation_is_reported_once_with_tool_diagnostic() {
    let fake = pool();
    let error = lifecycle(&fake, OutputShape::PropertyRows)
        .destroy(&DestroyRequest {
            name: "tank/home".into(),
            recursive: false,
        })
        .expect_err("children block destroy");

    match error {
        ZfsError::OperationFailed { operation, message } => {
            assert_eq!(operation, Operation::Destroy);
            assert!(message.contains("filesystem has children"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fake.calls_to("destroy").len(), 1);
    assert!(fake.exists("tank/home"));
}

#[test]
fn validation_failures_run_nothing() {
    let fake = pool();
    let lifecycle = lifecycle(&fake, OutputShape::PropertyRows);

    let failures = [
        lifecycle
            .set(&SetRequest {
                name: String::new(),
                properties: properties(&[("quota", "1")]),
            })
            .expect_err("missing name"),
        lifecycle
            .set(&SetRequest {
                name: "tank".into(),
                properties: PropertySet::new(),
            })
            .expect_err("missing properties"),
        lifecycle
            .snapshot(&SnapshotRequest {
                name: "tank".into(),
                snapshot: String::new(),
                recursive: false,
            })
            .expect_err("missing snapshot"),
        lifecycle
            .clone_snapshot(&CloneRequest {
                name: "tank/home".into(),
                snapshot: "monday".into(),
                target: String::new(),
                properties: PropertySet::new(),
            })
            .expect_err("missing target"),
        lifecycle
            .destroy(&DestroyRequest::default())
            .expect_err("missing name"),
        lifecycle
            .rollback(&RollbackRequest {
                name: "tank".into(),
                snapshot: "a@b".into(),
                recursive: false,
            })
            .expect_err("invalid label"),
    ];

    for error in failures {
        assert!(matches!(error, ZfsError::InvalidArgument(_)), "{error:?}");
    }
    assert!(fake.calls().is_empty());
}

#[test]
fn missing_name_message_names_the_field() {
    let fake = pool();
    let error = lifecycle(&fake, OutputShape::PropertyRows)
        .snapshot(&SnapshotRequest::default())
        .expect_err("missing name");
    assert!(matches!(error, ZfsError::InvalidArgument(message) if message == "must have name"));
}
