// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use zfsd_contracts::{DatasetService, ServiceError};
use zfsd_sys::{
    CommandRunner, DatasetLifecycle, DatasetRepository, DatasetSchema, SystemRunner,
};
use zfsd_types::{
    CloneRequest, Dataset, DestroyRequest, GetRequest, ListRequest, RollbackRequest, SetRequest,
    SnapshotRequest,
};

use crate::config::Config;
use crate::error::service_error;

/// [`DatasetService`] backed by the host `zfs` tool
///
/// Every call runs on the blocking thread pool; a panic there fails only the
/// request that caused it.
#[derive(Clone)]
pub struct ZfsDatasetService {
    lifecycle: Arc<DatasetLifecycle>,
}

impl ZfsDatasetService {
    pub fn new(lifecycle: DatasetLifecycle) -> Self {
        Self {
            lifecycle: Arc::new(lifecycle),
        }
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>, config: &Config) -> Self {
        let schema = Arc::new(DatasetSchema::new(config.output_shape, config.decoding));
        Self::new(DatasetLifecycle::new(DatasetRepository::new(
            runner,
            config.zfs_binary.as_str(),
            schema,
        )))
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_runner(Arc::new(SystemRunner::new()), config)
    }

    async fn blocking<T, F>(&self, operation: &'static str, call: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&DatasetLifecycle) -> zfsd_sys::Result<T> + Send + 'static,
    {
        let lifecycle = self.lifecycle.clone();
        tokio::task::spawn_blocking(move || call(&lifecycle))
            .await
            .map_err(|e| {
                error!("{operation} task failed: {e}");
                ServiceError::internal(format!("{operation} did not complete: {e}"))
            })?
            .map_err(service_error)
    }
}

#[async_trait]
impl DatasetService for ZfsDatasetService {
    async fn list(&self, request: ListRequest) -> Result<Vec<Dataset>, ServiceError> {
        let list_type = request
            .list_type()
            .map_err(|e| ServiceError::invalid_argument(e.to_string()))?;
        let prefix = request.prefix().map(str::to_owned);

        self.blocking("list", move |lifecycle| {
            lifecycle.repository().list(list_type, prefix.as_deref())
        })
        .await
    }

    async fn get(&self, request: GetRequest) -> Result<Dataset, ServiceError> {
        self.blocking("get", move |lifecycle| {
            lifecycle.repository().get(&request.name)
        })
        .await
    }

    async fn set(&self, request: SetRequest) -> Result<Dataset, ServiceError> {
        self.blocking("set", move |lifecycle| lifecycle.set(&request))
            .await
    }

    async fn snapshot(&self, request: SnapshotRequest) -> Result<Dataset, ServiceError> {
        self.blocking("snapshot", move |lifecycle| lifecycle.snapshot(&request))
            .await
    }

    async fn clone_snapshot(&self, request: CloneRequest) -> Result<Dataset, ServiceError> {
        self.blocking("clone", move |lifecycle| lifecycle.clone_snapshot(&request))
            .await
    }

    async fn destroy(&self, request: DestroyRequest) -> Result<Dataset, ServiceError> {
        self.blocking("destroy", move |lifecycle| lifecycle.destroy(&request))
            .await
    }

    async fn rollback(&self, request: RollbackRequest) -> Result<Dataset, ServiceError> {
        self.blocking("rollback", move |lifecycle| lifecycle.rollback(&request))
            .await
    }
}
