// SPDX-License-Identifier: GPL-3.0-only

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Bytes, HttpBody};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::http::header::USER_AGENT;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use zfsd_contracts::{DatasetService, RequestId, ServiceError};

use crate::handlers::{RpcRequest, RpcResponse, dispatch};

/// Path of the JSON-RPC endpoint
pub const RPC_PATH: &str = "/_zfs_";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn DatasetService>,
}

/// RPC method name, attached to responses for the access log
#[derive(Debug, Clone)]
struct RpcMethod(String);

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub fn create_router(service: Arc<dyn DatasetService>) -> Router {
    Router::new()
        .route(RPC_PATH, post(handle_rpc))
        .route("/health", get(health))
        .layer(middleware::from_fn(log_requests))
        .with_state(AppState { service })
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /_zfs_
async fn handle_rpc(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected unparseable RPC body: {e}");
            let error = ServiceError::invalid_argument(format!("invalid request body: {e}"));
            return (
                StatusCode::BAD_REQUEST,
                Json(RpcResponse::failure(Value::Null, error)),
            )
                .into_response();
        }
    };

    let method = RpcMethod(request.method.clone());
    let mut response = Json(dispatch(state.service.as_ref(), request).await).into_response();
    response.extensions_mut().insert(method);
    response
}

/// One access log event per request
async fn log_requests(request: Request, next: Next) -> Response {
    let request_id = RequestId::new();
    let started = Instant::now();
    let uri = request.uri().clone();
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "local".to_string());

    let response = next.run(request).await;

    let rpc_method = response
        .extensions()
        .get::<RpcMethod>()
        .map(|method| method.0.as_str())
        .unwrap_or("-");
    let size = response.body().size_hint().exact().unwrap_or_default();

    info!(
        target: "zfsd_service::access",
        request_id = %request_id,
        method = rpc_method,
        duration_ms = started.elapsed().as_millis() as u64,
        uri = %uri,
        status = response.status().as_u16(),
        size,
        user_agent = %user_agent,
        client = %client,
        "request served"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::{Method, Request};
    use serde_json::json;
    use tower::ServiceExt;
    use zfsd_contracts::ServiceErrorKind;
    use zfsd_sys::testing::FakeZfs;

    use crate::adapters::ZfsDatasetService;
    use crate::config::{Args, Config, FileConfig};

    fn router() -> (Arc<FakeZfs>, Router) {
        let fake = FakeZfs::new();
        fake.add_filesystem("tank");
        fake.add_volume("tank/vol", 8192);
        let fake = Arc::new(fake);

        let config = Config::resolve(Args::default(), FileConfig::default()).expect("defaults");
        let service = Arc::new(ZfsDatasetService::with_runner(fake.clone(), &config));
        (fake, create_router(service))
    }

    async fn send(router: Router, method: Method, path: &str, body: &str) -> (StatusCode, Bytes) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, "zfsd-test")
            .body(Body::from(body.to_string()))
            .expect("request");

        let response = router.oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, body)
    }

    #[tokio::test]
    async fn rpc_endpoint_serves_requests() {
        let (_fake, router) = router();
        let (status, body) = send(
            router,
            Method::POST,
            RPC_PATH,
            r#"{"method":"ZFS.Get","params":[{"name":"tank/vol"}],"id":1}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let response: RpcResponse = serde_json::from_slice(&body).expect("rpc response");
        assert_eq!(response.id, json!(1));
        let result = response.result.expect("result");
        assert_eq!(result["volsize"], 8192);
        assert_eq!(result["type"], "volume");
    }

    #[tokio::test]
    async fn rpc_errors_use_status_ok() {
        let (_fake, router) = router();
        let (status, body) = send(
            router,
            Method::POST,
            RPC_PATH,
            r#"{"method":"ZFS.Get","params":[{"name":"tank/none"}],"id":2}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let response: RpcResponse = serde_json::from_slice(&body).expect("rpc response");
        assert_eq!(response.result, None);
        assert_eq!(response.error.map(|e| e.kind), Some(ServiceErrorKind::NotFound));
    }

    #[tokio::test]
    async fn unparseable_body_is_bad_request() {
        let (fake, router) = router();
        let (status, body) = send(router, Method::POST, RPC_PATH, "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let response: RpcResponse = serde_json::from_slice(&body).expect("rpc response");
        assert_eq!(
            response.error.map(|e| e.kind),
            Some(ServiceErrorKind::InvalidArgument)
        );
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn rpc_path_rejects_get() {
        let (fake, router) = router();
        let (status, _) = send(router, Method::GET, RPC_PATH, "").await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn health_reports_version() {
        let (_fake, router) = router();
        let (status, body) = send(router, Method::GET, "/health", "").await;

        assert_eq!(status, StatusCode::OK);
        let health: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(health["status"], "ok");
        assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    }
}
