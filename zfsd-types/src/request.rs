// SPDX-License-Identifier: GPL-3.0-only

//! Request records accepted by the dataset operations
//!
//! Missing fields deserialize to their empty value so that validation, not the
//! decoder, reports which field a caller forgot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::{DatasetTypeError, ListType};

/// Property name to value assignments
pub type PropertySet = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    /// `all`, `filesystem`, `volume` or `snapshot`; empty means `all`
    #[serde(rename = "type")]
    pub dataset_type: String,

    /// Restrict the listing to this dataset and its descendants
    pub prefix: String,
}

impl ListRequest {
    pub fn list_type(&self) -> Result<ListType, DatasetTypeError> {
        self.dataset_type.parse()
    }

    pub fn prefix(&self) -> Option<&str> {
        if self.prefix.is_empty() {
            None
        } else {
            Some(self.prefix.as_str())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetRequest {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: PropertySet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotRequest {
    pub name: String,
    /// Snapshot label, without the dataset name
    pub snapshot: String,
    /// Also snapshot every descendant dataset
    pub recursive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneRequest {
    pub name: String,
    pub snapshot: String,
    /// Name of the dataset to create
    pub target: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: PropertySet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestroyRequest {
    pub name: String,
    pub recursive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackRequest {
    pub name: String,
    pub snapshot: String,
    /// Destroy snapshots more recent than the rollback target
    pub recursive: bool,
}
