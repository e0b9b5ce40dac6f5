// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use thiserror::Error;

use crate::command::ExecutionError;
use crate::parse::ParseError;

/// Mutating operations performed through `zfs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Set,
    Snapshot,
    Clone,
    Destroy,
    Rollback,
}

impl Operation {
    /// The `zfs` subcommand implementing this operation
    pub fn subcommand(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Snapshot => "snapshot",
            Self::Clone => "clone",
            Self::Destroy => "destroy",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subcommand())
    }
}

/// Error types for dataset operations
#[derive(Error, Debug)]
pub enum ZfsError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Malformed zfs output: {0}")]
    MalformedRecord(#[from] ParseError),

    #[error("zfs {operation} failed: {message}")]
    OperationFailed {
        operation: Operation,
        message: String,
    },

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl ZfsError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::InvalidArgument(format!("must have {field}"))
    }
}

/// Result type alias for dataset operations
pub type Result<T> = std::result::Result<T, ZfsError>;
