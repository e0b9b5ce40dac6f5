// SPDX-License-Identifier: GPL-3.0-only

//! JSON-RPC 1.0 style codec and method dispatch
//!
//! Requests look like `{"method": "ZFS.Get", "params": [{"name": "tank"}], "id": 1}`.
//! The `ZFS.` prefix is optional and `params` may also be a bare object.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use zfsd_contracts::{DatasetService, ServiceError};

use crate::error::method_not_found;

pub const SERVICE_NAME: &str = "ZFS";

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: Value,
    pub result: Option<Value>,
    pub error: Option<ServiceError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: ServiceError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    List,
    Get,
    Set,
    Snapshot,
    Clone,
    Destroy,
    Rollback,
}

impl FromStr for Method {
    type Err = ServiceError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let bare = name
            .strip_prefix(SERVICE_NAME)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(name);

        match bare {
            "List" => Ok(Self::List),
            "Get" => Ok(Self::Get),
            "Set" => Ok(Self::Set),
            "Snapshot" => Ok(Self::Snapshot),
            "Clone" => Ok(Self::Clone),
            "Destroy" => Ok(Self::Destroy),
            "Rollback" => Ok(Self::Rollback),
            _ => Err(method_not_found(name)),
        }
    }
}

/// Decode `params` into a request record
///
/// Accepts `null`, an empty array, a one-element array or a bare object.
fn decode_params<T>(params: Value) -> Result<T, ServiceError>
where
    T: DeserializeOwned + Default,
{
    let value = match params {
        Value::Null => return Ok(T::default()),
        Value::Array(mut items) => match items.len() {
            0 => return Ok(T::default()),
            1 => items.remove(0),
            n => {
                return Err(ServiceError::invalid_argument(format!(
                    "expected one parameter object, got {n}"
                )));
            }
        },
        other => other,
    };

    serde_json::from_value(value)
        .map_err(|e| ServiceError::invalid_argument(format!("invalid params: {e}")))
}

fn encode<T: Serialize>(value: T) -> Result<Value, ServiceError> {
    serde_json::to_value(value)
        .map_err(|e| ServiceError::internal(format!("failed to encode result: {e}")))
}

async fn call(
    service: &dyn DatasetService,
    method: Method,
    params: Value,
) -> Result<Value, ServiceError> {
    match method {
        Method::List => encode(service.list(decode_params(params)?).await?),
        Method::Get => encode(service.get(decode_params(params)?).await?),
        Method::Set => encode(service.set(decode_params(params)?).await?),
        Method::Snapshot => encode(service.snapshot(decode_params(params)?).await?),
        Method::Clone => encode(service.clone_snapshot(decode_params(params)?).await?),
        Method::Destroy => encode(service.destroy(decode_params(params)?).await?),
        Method::Rollback => encode(service.rollback(decode_params(params)?).await?),
    }
}

/// Run one request against `service`; errors are carried in the response
pub async fn dispatch(service: &dyn DatasetService, request: RpcRequest) -> RpcResponse {
    let RpcRequest { method, params, id } = request;

    let outcome = match method.parse::<Method>() {
        Ok(method) => call(service, method, params).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(result) => RpcResponse::success(id, result),
        Err(error) => {
            debug!("{method} failed: {error}");
            RpcResponse::failure(id, error)
        }
    }
}
