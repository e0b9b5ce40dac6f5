// SPDX-License-Identifier: GPL-3.0-only

//! Read path: listing and fetching datasets

use std::sync::Arc;

use tracing::debug;
use zfsd_types::{Dataset, ListType};

use crate::command::{CommandInvocation, CommandRunner, ExecutionError, Row};
use crate::error::{Result, ZfsError};
use crate::parse::RecordParser;
use crate::properties::{DatasetSchema, OutputShape};

/// Default program name, resolved through `PATH`
pub const DEFAULT_ZFS_BINARY: &str = "zfs";

pub struct DatasetRepository {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    schema: Arc<DatasetSchema>,
    parser: RecordParser,
}

impl DatasetRepository {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        binary: impl Into<String>,
        schema: Arc<DatasetSchema>,
    ) -> Self {
        Self {
            runner,
            binary: binary.into(),
            parser: RecordParser::new(schema.clone()),
            schema,
        }
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    /// List datasets of `list_type`, optionally limited to `prefix` and its descendants
    ///
    /// A prefix that names no dataset yields an empty listing.
    pub fn list(&self, list_type: ListType, prefix: Option<&str>) -> Result<Vec<Dataset>> {
        let rows = match self.run(self.list_args(list_type, prefix)) {
            Ok(rows) => rows,
            Err(e) if prefix.is_some() && e.is_not_found() => {
                debug!("No datasets under {prefix:?}");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(self.parser.parse_grouped(&rows)?)
    }

    /// Fetch one dataset by its full name
    pub fn get(&self, name: &str) -> Result<Dataset> {
        if name.is_empty() {
            return Err(ZfsError::missing("name"));
        }

        let rows = self.run(self.get_args(name)).map_err(|e| {
            if e.is_not_found() {
                ZfsError::NotFound(name.to_string())
            } else {
                ZfsError::Execution(e)
            }
        })?;

        Ok(self.parser.parse_single(&rows)?)
    }

    pub fn list_args(&self, list_type: ListType, prefix: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = match self.schema.shape() {
            OutputShape::PropertyRows => vec![
                "get".into(),
                "-Hp".into(),
                "-o".into(),
                "name,property,value".into(),
                "-t".into(),
                list_type.zfs_types().into(),
                "-r".into(),
                self.schema.property_list(),
            ],
            OutputShape::Columns => {
                let mut args: Vec<String> = vec![
                    "list".into(),
                    "-Hp".into(),
                    "-o".into(),
                    self.schema.column_list(),
                    "-t".into(),
                    list_type.zfs_types().into(),
                ];
                if prefix.is_some() {
                    args.push("-r".into());
                }
                args
            }
        };

        if let Some(prefix) = prefix {
            args.push(prefix.to_string());
        }
        args
    }

    pub fn get_args(&self, name: &str) -> Vec<String> {
        match self.schema.shape() {
            OutputShape::PropertyRows => vec![
                "get".into(),
                "-Hp".into(),
                "-o".into(),
                "name,property,value".into(),
                self.schema.property_list(),
                name.to_string(),
            ],
            OutputShape::Columns => vec![
                "list".into(),
                "-Hp".into(),
                "-o".into(),
                self.schema.column_list(),
                name.to_string(),
            ],
        }
    }

    /// Run `zfs` with `args` and return its captured rows
    pub(crate) fn run(&self, args: Vec<String>) -> std::result::Result<Vec<Row>, ExecutionError> {
        self.runner
            .run(CommandInvocation::new(self.binary.as_str(), args))
            .map(|output| output.into_rows())
    }
}
