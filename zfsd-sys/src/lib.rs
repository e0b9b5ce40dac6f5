// SPDX-License-Identifier: GPL-3.0-only

//! zfs command execution and dataset operations
//!
//! This crate shells out to the host `zfs` tool and reshapes its tab-separated
//! output into [`zfsd_types::Dataset`] records:
//! - [`command`] runs the external program and splits its output into rows
//! - [`properties`] holds the static property table and the [`DatasetSchema`]
//! - [`parse`] folds rows into datasets
//! - [`repository`] is the read path (`list`, `get`)
//! - [`lifecycle`] is the write path (set, snapshot, clone, destroy, rollback)
//! - `testing` (feature `testing`) is an in-memory `zfs` for the tests of this and dependent crates
//!
//! Every call is synchronous and blocks until `zfs` exits. Nothing is cached.

pub mod command;
pub mod error;
pub mod lifecycle;
pub mod parse;
pub mod properties;
pub mod repository;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::{
    CommandInvocation, CommandOutput, CommandRunner, ExecutionError, Row, SystemRunner,
    split_rows,
};
pub use error::{Operation, Result, ZfsError};
pub use lifecycle::DatasetLifecycle;
pub use parse::{ParseError, RecordParser};
pub use properties::{DATASET_PROPERTIES, DatasetSchema, Decoding, Field, OutputShape, Property};
pub use repository::DatasetRepository;
