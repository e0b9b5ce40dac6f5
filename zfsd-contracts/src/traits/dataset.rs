// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use zfsd_types::{
    CloneRequest, Dataset, DestroyRequest, GetRequest, ListRequest, RollbackRequest, SetRequest,
    SnapshotRequest,
};

use crate::ServiceError;

/// Dataset operations exposed over RPC
#[async_trait]
pub trait DatasetService: Send + Sync {
    async fn list(&self, request: ListRequest) -> Result<Vec<Dataset>, ServiceError>;

    async fn get(&self, request: GetRequest) -> Result<Dataset, ServiceError>;

    async fn set(&self, request: SetRequest) -> Result<Dataset, ServiceError>;

    async fn snapshot(&self, request: SnapshotRequest) -> Result<Dataset, ServiceError>;

    async fn clone_snapshot(&self, request: CloneRequest) -> Result<Dataset, ServiceError>;

    /// Returns the dataset as it was immediately before destruction.
    async fn destroy(&self, request: DestroyRequest) -> Result<Dataset, ServiceError>;

    async fn rollback(&self, request: RollbackRequest) -> Result<Dataset, ServiceError>;
}
