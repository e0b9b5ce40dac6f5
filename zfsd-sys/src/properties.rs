// SPDX-License-Identifier: GPL-3.0-only

//! Property table mapping `zfs` property names onto [`Dataset`] fields
//!
//! The table is hand-maintained: its order is the column order used when
//! `zfs list -o` output is requested, and it is the property list passed to
//! `zfs get`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zfsd_types::{Dataset, DatasetType};

use crate::parse::ParseError;

/// Placeholder printed by `zfs` for a property that has no value
pub const UNSET: &str = "-";

/// Dataset field written by a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Type,
    Used,
    Available,
    Written,
    VolumeSize,
    Quota,
    Referenced,
    UsedByDataset,
    LogicalUsed,
    Mountpoint,
    Compression,
    Origin,
}

/// A `zfs` property and the field it decodes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Property {
    pub name: &'static str,
    pub field: Field,
}

impl Property {
    pub const fn new(name: &'static str, field: Field) -> Self {
        Self { name, field }
    }
}

pub const DATASET_PROPERTIES: &[Property] = &[
    Property::new("type", Field::Type),
    Property::new("used", Field::Used),
    Property::new("available", Field::Available),
    Property::new("written", Field::Written),
    Property::new("volsize", Field::VolumeSize),
    Property::new("quota", Field::Quota),
    Property::new("referenced", Field::Referenced),
    Property::new("usedbydataset", Field::UsedByDataset),
    Property::new("logicalused", Field::LogicalUsed),
    Property::new("mountpoint", Field::Mountpoint),
    Property::new("compression", Field::Compression),
    Property::new("origin", Field::Origin),
];

/// How values that are neither numeric nor [`UNSET`] are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decoding {
    /// Malformed numbers decode to zero, unknown types to absent
    #[default]
    Lenient,
    /// Malformed values are reported as [`ParseError::InvalidValue`]
    Strict,
}

/// Layout of the rows requested from `zfs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputShape {
    /// `zfs get -o name,property,value`: one row per dataset property
    #[default]
    PropertyRows,
    /// `zfs list -o name,...`: one row per dataset, one column per property
    Columns,
}

impl FromStr for OutputShape {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "property-rows" => Ok(Self::PropertyRows),
            "columns" => Ok(Self::Columns),
            other => Err(format!(
                "unknown output shape '{other}', expected 'property-rows' or 'columns'"
            )),
        }
    }
}

/// Decode an unsigned property value
pub fn decode_uint(
    property: &str,
    value: &str,
    decoding: Decoding,
) -> Result<Option<u64>, ParseError> {
    if value == UNSET {
        return Ok(None);
    }

    match value.parse::<u64>() {
        Ok(number) => Ok(Some(number)),
        Err(_) if decoding == Decoding::Lenient => Ok(Some(0)),
        Err(_) => Err(ParseError::InvalidValue {
            property: property.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Decode a string property value
pub fn decode_text(value: &str) -> String {
    if value == UNSET {
        String::new()
    } else {
        value.to_string()
    }
}

fn decode_type(value: &str, decoding: Decoding) -> Result<Option<DatasetType>, ParseError> {
    if value == UNSET {
        return Ok(None);
    }

    match value.parse::<DatasetType>() {
        Ok(dataset_type) => Ok(Some(dataset_type)),
        Err(_) if decoding == Decoding::Lenient => Ok(None),
        Err(_) => Err(ParseError::InvalidValue {
            property: "type".to_string(),
            value: value.to_string(),
        }),
    }
}

impl Field {
    /// Decode `value` and store it on `dataset`
    pub fn apply(
        self,
        dataset: &mut Dataset,
        property: &str,
        value: &str,
        decoding: Decoding,
    ) -> Result<(), ParseError> {
        let uint = |value: &str| decode_uint(property, value, decoding);

        match self {
            Self::Type => dataset.dataset_type = decode_type(value, decoding)?,
            Self::Used => dataset.used = uint(value)?,
            Self::Available => dataset.available = uint(value)?,
            Self::Written => dataset.written = uint(value)?,
            Self::VolumeSize => dataset.volume_size = uint(value)?,
            Self::Quota => dataset.quota = uint(value)?,
            Self::Referenced => dataset.referenced = uint(value)?,
            Self::UsedByDataset => dataset.used_by_dataset = uint(value)?,
            Self::LogicalUsed => dataset.logical_used = uint(value)?,
            Self::Mountpoint => dataset.mountpoint = decode_text(value),
            Self::Compression => dataset.compression = decode_text(value),
            Self::Origin => dataset.origin = decode_text(value),
        }

        Ok(())
    }
}

/// Immutable description of which properties are requested and how they decode
///
/// Built once at startup and shared by the parser and the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    properties: Vec<Property>,
    shape: OutputShape,
    decoding: Decoding,
}

impl DatasetSchema {
    pub fn new(shape: OutputShape, decoding: Decoding) -> Self {
        Self::with_properties(DATASET_PROPERTIES.to_vec(), shape, decoding)
    }

    pub fn with_properties(properties: Vec<Property>, shape: OutputShape, decoding: Decoding) -> Self {
        Self {
            properties,
            shape,
            decoding,
        }
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|property| property.name == name)
    }

    pub fn shape(&self) -> OutputShape {
        self.shape
    }

    pub fn decoding(&self) -> Decoding {
        self.decoding
    }

    /// Comma-separated property names, in table order
    pub fn property_list(&self) -> String {
        self.properties
            .iter()
            .map(|property| property.name)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `name` followed by every property, for `zfs list -o`
    pub fn column_list(&self) -> String {
        format!("name,{}", self.property_list())
    }

    /// Fields in a [`OutputShape::Columns`] row
    pub fn column_count(&self) -> usize {
        self.properties.len() + 1
    }
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self::new(OutputShape::default(), Decoding::default())
    }
}
