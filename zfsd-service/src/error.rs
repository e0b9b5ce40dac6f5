// SPDX-License-Identifier: GPL-3.0-only

use zfsd_contracts::{ServiceError, ServiceErrorKind};
use zfsd_sys::ZfsError;

/// Map a core error onto the wire error returned to RPC callers
pub fn service_error(error: ZfsError) -> ServiceError {
    let kind = match &error {
        ZfsError::InvalidArgument(_) => ServiceErrorKind::InvalidArgument,
        ZfsError::NotFound(_) => ServiceErrorKind::NotFound,
        ZfsError::Precondition(_) => ServiceErrorKind::PreconditionFailed,
        ZfsError::MalformedRecord(_) => ServiceErrorKind::MalformedRecord,
        ZfsError::OperationFailed { .. } => ServiceErrorKind::OperationFailed,
        ZfsError::Execution(_) => ServiceErrorKind::ExecutionFailed,
    };
    ServiceError::new(kind, error.to_string())
}

pub fn method_not_found(method: &str) -> ServiceError {
    ServiceError::new(
        ServiceErrorKind::MethodNotFound,
        format!("unknown method '{method}'"),
    )
}
