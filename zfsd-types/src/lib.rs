// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the zfsd daemon
//!
//! These types are shared by every layer of the stack:
//!
//! - **zfsd-sys**: decodes `zfs` output into [`Dataset`] records and consumes the request types
//! - **zfsd-service**: deserializes requests from and serializes datasets to JSON-RPC bodies
//!
//! A [`Dataset`] is always rebuilt from the current state reported by `zfs`; nothing in
//! this crate caches or mutates storage state.

pub mod dataset;
pub mod request;

pub use dataset::{
    Dataset, DatasetType, DatasetTypeError, ListType, SNAPSHOT_SEPARATOR, snapshot_name,
};
pub use request::{
    CloneRequest, DestroyRequest, GetRequest, ListRequest, PropertySet, RollbackRequest,
    SetRequest, SnapshotRequest,
};
