// SPDX-License-Identifier: GPL-3.0-only

pub mod error;
pub mod id;

pub use error::{ServiceError, ServiceErrorKind};
pub use id::RequestId;
