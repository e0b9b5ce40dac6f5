// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    /// The request was incomplete or malformed; nothing was executed
    InvalidArgument,
    NotFound,
    /// The dataset exists but has the wrong type for the operation
    PreconditionFailed,
    /// `zfs` produced output that did not match the expected shape
    MalformedRecord,
    /// A mutating `zfs` command ran and failed
    OperationFailed,
    /// A read-only `zfs` command could not be run or failed
    ExecutionFailed,
    MethodNotFound,
    Internal,
}

impl ServiceErrorKind {
    pub fn code(self) -> u16 {
        match self {
            Self::InvalidArgument => 400,
            Self::NotFound => 404,
            Self::PreconditionFailed => 412,
            Self::MalformedRecord => 502,
            Self::OperationFailed => 500,
            Self::ExecutionFailed => 500,
            Self::MethodNotFound => 501,
            Self::Internal => 500,
        }
    }
}

/// Error value returned to RPC callers
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub code: u16,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Internal, message)
    }
}
