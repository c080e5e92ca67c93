use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
};
use dashmap::DashMap;
use std::sync::Arc;

use super::protocol::{AUTH_HEADER, AskRequest, AskResponse, CheckResponse};
use super::security::SecurityManager;
use super::server::EndpointHandlerFn;

fn authorized(security: &SecurityManager, headers: &HeaderMap) -> bool {
    let presented = headers.get(AUTH_HEADER).and_then(|value| value.to_str().ok());
    security.check(presented)
}

/// Dispatches a message to the named endpoint handler.
pub async fn handle_ask(
    Extension(endpoints): Extension<Arc<DashMap<String, EndpointHandlerFn>>>,
    Extension(security): Extension<Arc<SecurityManager>>,
    headers: HeaderMap,
    Json(req): Json<AskRequest>,
) -> (StatusCode, Json<AskResponse>) {
    if !authorized(&security, &headers) {
        tracing::warn!("Rejected unauthenticated ask for {}", req.endpoint);
        return (
            StatusCode::UNAUTHORIZED,
            Json(AskResponse {
                ok: false,
                payload: None,
                error: Some("authentication failed".to_string()),
            }),
        );
    }

    let handler = match endpoints.get(&req.endpoint) {
        Some(entry) => entry.value().clone(),
        None => {
            tracing::debug!("Ask for unknown endpoint {}", req.endpoint);
            return (
                StatusCode::NOT_FOUND,
                Json(AskResponse {
                    ok: false,
                    payload: None,
                    error: Some(format!("unknown endpoint: {}", req.endpoint)),
                }),
            );
        }
    };

    match handler(req.payload).await {
        Ok(payload) => (
            StatusCode::OK,
            Json(AskResponse {
                ok: true,
                payload: Some(payload),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Endpoint {} failed: {}", req.endpoint, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AskResponse {
                    ok: false,
                    payload: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Answers whether a named endpoint is currently bound.
pub async fn handle_check(
    Extension(endpoints): Extension<Arc<DashMap<String, EndpointHandlerFn>>>,
    Extension(security): Extension<Arc<SecurityManager>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> (StatusCode, Json<CheckResponse>) {
    if !authorized(&security, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(CheckResponse { present: false }));
    }

    let present = endpoints.contains_key(&name);
    (StatusCode::OK, Json(CheckResponse { present }))
}
