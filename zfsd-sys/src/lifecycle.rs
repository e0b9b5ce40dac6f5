// SPDX-License-Identifier: GPL-3.0-only

//! Write path: mutating dataset operations
//!
//! Every operation validates its request, checks preconditions against the
//! current state, runs exactly one mutating `zfs` command and re-reads the
//! result. Validation and precondition failures never reach the mutating
//! command. Failed mutations are not retried.

use tracing::{info, warn};
use zfsd_types::{
    CloneRequest, Dataset, DestroyRequest, PropertySet, RollbackRequest, SNAPSHOT_SEPARATOR,
    SetRequest, SnapshotRequest, snapshot_name,
};

use crate::error::{Operation, Result, ZfsError};
use crate::repository::DatasetRepository;

const RECURSIVE_FLAG: &str = "-r";
const PROPERTY_FLAG: &str = "-o";

pub struct DatasetLifecycle {
    repository: DatasetRepository,
}

impl DatasetLifecycle {
    pub fn new(repository: DatasetRepository) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &DatasetRepository {
        &self.repository
    }

    /// Assign every property in one `zfs set` call
    pub fn set(&self, request: &SetRequest) -> Result<Dataset> {
        require("name", &request.name)?;
        if request.properties.is_empty() {
            return Err(ZfsError::missing("properties"));
        }
        require_property_names(&request.properties)?;

        self.repository.get(&request.name)?;

        info!(
            "Setting {} properties on {}",
            request.properties.len(),
            request.name
        );
        self.mutate(
            Operation::Set,
            set_args(&request.name, &request.properties),
        )?;

        self.repository.get(&request.name)
    }

    pub fn snapshot(&self, request: &SnapshotRequest) -> Result<Dataset> {
        require("name", &request.name)?;
        require("snapshot", &request.snapshot)?;
        require_plain_name("name", &request.name)?;
        require_label(&request.snapshot)?;

        self.repository.get(&request.name)?;

        let snapshot = snapshot_name(&request.name, &request.snapshot);
        info!("Creating snapshot {snapshot}, recursive={}", request.recursive);
        self.mutate(
            Operation::Snapshot,
            snapshot_args(&snapshot, request.recursive),
        )?;

        self.repository.get(&snapshot)
    }

    /// Create `target` from the snapshot `name@snapshot`
    pub fn clone_snapshot(&self, request: &CloneRequest) -> Result<Dataset> {
        require("name", &request.name)?;
        require("snapshot", &request.snapshot)?;
        require("target", &request.target)?;
        require_label(&request.snapshot)?;
        require_plain_name("target", &request.target)?;
        require_property_names(&request.properties)?;

        let source = self.require_snapshot(&request.name, &request.snapshot)?;

        info!("Cloning {} to {}", source.name, request.target);
        self.mutate(
            Operation::Clone,
            clone_args(&source.name, &request.target, &request.properties),
        )?;

        self.repository.get(&request.target)
    }

    /// Destroy a dataset and return its last observed state
    pub fn destroy(&self, request: &DestroyRequest) -> Result<Dataset> {
        require("name", &request.name)?;

        let dataset = self.repository.get(&request.name)?;

        info!("Destroying {}, recursive={}", dataset.name, request.recursive);
        self.mutate(
            Operation::Destroy,
            destroy_args(&request.name, request.recursive),
        )?;

        Ok(dataset)
    }

    /// Roll `name` back to `name@snapshot`
    pub fn rollback(&self, request: &RollbackRequest) -> Result<Dataset> {
        require("name", &request.name)?;
        require("snapshot", &request.snapshot)?;
        require_label(&request.snapshot)?;

        let snapshot = self.require_snapshot(&request.name, &request.snapshot)?;

        info!(
            "Rolling back {} to {}, recursive={}",
            request.name, snapshot.name, request.recursive
        );
        self.mutate(
            Operation::Rollback,
            rollback_args(&snapshot.name, request.recursive),
        )?;

        self.repository.get(&request.name)
    }

    fn require_snapshot(&self, name: &str, label: &str) -> Result<Dataset> {
        let composed = snapshot_name(name, label);
        let dataset = self.repository.get(&composed)?;
        if !dataset.is_snapshot() {
            return Err(ZfsError::Precondition(format!("{composed} is not a snapshot")));
        }
        Ok(dataset)
    }

    fn mutate(&self, operation: Operation, args: Vec<String>) -> Result<()> {
        self.repository.run(args).map(|_| ()).map_err(|e| {
            warn!("zfs {operation} failed: {e}");
            ZfsError::OperationFailed {
                operation,
                message: e.diagnostic(),
            }
        })
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ZfsError::missing(field));
    }
    Ok(())
}

fn require_plain_name(field: &str, value: &str) -> Result<()> {
    if value.contains(SNAPSHOT_SEPARATOR) {
        return Err(ZfsError::InvalidArgument(format!(
            "{field} must not name a snapshot: {value}"
        )));
    }
    Ok(())
}

fn require_label(label: &str) -> Result<()> {
    if label.contains(SNAPSHOT_SEPARATOR) || label.contains('/') {
        return Err(ZfsError::InvalidArgument(format!(
            "invalid snapshot label: {label}"
        )));
    }
    Ok(())
}

fn require_property_names(properties: &PropertySet) -> Result<()> {
    if let Some(key) = properties
        .keys()
        .find(|key| key.is_empty() || key.contains('='))
    {
        return Err(ZfsError::InvalidArgument(format!(
            "invalid property name: '{key}'"
        )));
    }
    Ok(())
}

fn assignment(key: &str, value: &str) -> String {
    format!("{key}={value}")
}

/// `set k=v... name`
pub fn set_args(name: &str, properties: &PropertySet) -> Vec<String> {
    let mut args = Vec::with_capacity(properties.len() + 2);
    args.push(Operation::Set.subcommand().to_string());
    args.extend(properties.iter().map(|(key, value)| assignment(key, value)));
    args.push(name.to_string());
    args
}

/// `snapshot [-r] name@label`
pub fn snapshot_args(snapshot: &str, recursive: bool) -> Vec<String> {
    let mut args = vec![Operation::Snapshot.subcommand().to_string()];
    if recursive {
        args.push(RECURSIVE_FLAG.to_string());
    }
    args.push(snapshot.to_string());
    args
}

/// `clone [-o k=v]... source target`
pub fn clone_args(source: &str, target: &str, properties: &PropertySet) -> Vec<String> {
    let mut args = Vec::with_capacity(properties.len() * 2 + 3);
    args.push(Operation::Clone.subcommand().to_string());
    for (key, value) in properties {
        args.push(PROPERTY_FLAG.to_string());
        args.push(assignment(key, value));
    }
    args.push(source.to_string());
    args.push(target.to_string());
    args
}

/// `destroy [-r] name`
pub fn destroy_args(name: &str, recursive: bool) -> Vec<String> {
    let mut args = vec![Operation::Destroy.subcommand().to_string()];
    if recursive {
        args.push(RECURSIVE_FLAG.to_string());
    }
    args.push(name.to_string());
    args
}

/// `rollback [-r] name@label`
pub fn rollback_args(snapshot: &str, recursive: bool) -> Vec<String> {
    let mut args = vec![Operation::Rollback.subcommand().to_string()];
    if recursive {
        args.push(RECURSIVE_FLAG.to_string());
    }
    args.push(snapshot.to_string());
    args
}
