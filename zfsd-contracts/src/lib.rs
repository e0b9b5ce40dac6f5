// SPDX-License-Identifier: GPL-3.0-only

pub mod protocol;
pub mod traits;

pub use protocol::{RequestId, ServiceError, ServiceErrorKind};
pub use traits::DatasetService;
