// SPDX-License-Identifier: GPL-3.0-only

//! Dataset records as reported by `zfs`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between a dataset name and a snapshot label (`tank/home@monday`)
pub const SNAPSHOT_SEPARATOR: char = '@';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown dataset type: {0}")]
pub struct DatasetTypeError(pub String);

/// Kind of a concrete dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    Filesystem,
    Volume,
    Snapshot,
}

impl DatasetType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Volume => "volume",
            Self::Snapshot => "snapshot",
        }
    }
}

impl FromStr for DatasetType {
    type Err = DatasetTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "filesystem" => Ok(Self::Filesystem),
            "volume" => Ok(Self::Volume),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(DatasetTypeError(other.to_string())),
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type filter for listings; `All` matches every dataset type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListType {
    #[default]
    All,
    Filesystem,
    Volume,
    Snapshot,
}

impl ListType {
    /// Value passed to `zfs -t`
    ///
    /// `zfs -t all` also reports bookmarks, so `All` names the three dataset
    /// types explicitly.
    pub fn zfs_types(self) -> &'static str {
        match self {
            Self::All => "filesystem,volume,snapshot",
            Self::Filesystem => "filesystem",
            Self::Volume => "volume",
            Self::Snapshot => "snapshot",
        }
    }

    /// Whether a dataset of the given type belongs in this listing
    pub fn matches(self, dataset_type: Option<DatasetType>) -> bool {
        match self {
            Self::All => true,
            Self::Filesystem => dataset_type == Some(DatasetType::Filesystem),
            Self::Volume => dataset_type == Some(DatasetType::Volume),
            Self::Snapshot => dataset_type == Some(DatasetType::Snapshot),
        }
    }
}

impl FromStr for ListType {
    type Err = DatasetTypeError;

    /// An empty string selects `All`, matching requests that omit the type.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" | "all" => Ok(Self::All),
            "filesystem" => Ok(Self::Filesystem),
            "volume" => Ok(Self::Volume),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(DatasetTypeError(other.to_string())),
        }
    }
}

/// A ZFS dataset (filesystem, volume or snapshot)
///
/// Byte counts are `None` when `zfs` reports the property as not applicable
/// (for example `volsize` on a filesystem). String properties reported as not
/// applicable are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Full dataset name, including any `@snapshot` suffix
    pub name: String,

    #[serde(rename = "type")]
    pub dataset_type: Option<DatasetType>,

    pub used: Option<u64>,

    pub available: Option<u64>,

    pub written: Option<u64>,

    #[serde(rename = "volsize")]
    pub volume_size: Option<u64>,

    pub quota: Option<u64>,

    pub referenced: Option<u64>,

    #[serde(rename = "usedbydataset")]
    pub used_by_dataset: Option<u64>,

    #[serde(rename = "logicalused")]
    pub logical_used: Option<u64>,

    pub mountpoint: String,

    pub compression: String,

    /// Source snapshot, set only for clones
    pub origin: String,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.dataset_type == Some(DatasetType::Snapshot)
    }

    pub fn is_clone(&self) -> bool {
        !self.origin.is_empty()
    }
}

/// Compose `<dataset>@<label>`
pub fn snapshot_name(dataset: &str, label: &str) -> String {
    format!("{dataset}{SNAPSHOT_SEPARATOR}{label}")
}
