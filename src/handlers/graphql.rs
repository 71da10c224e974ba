use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::Value;

use crate::proxy::ForwardOptions;
use crate::upstream;
use crate::AppState;

/// POST /api/graphql — generic proxy for dashboard operations. A 401 from
/// upstream triggers the shared refresh-and-replay path, except when the
/// proxied operation is itself the refresh exchange: that 401 is terminal.
pub async fn graphql_proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload: Option<Value> = serde_json::from_slice(&body).ok();
    let refresh_exempt = payload
        .as_ref()
        .map(upstream::is_refresh_operation)
        .unwrap_or(false);

    if let Some(operation) = payload.as_ref().and_then(upstream::operation_name) {
        tracing::debug!(operation, "proxying graphql operation");
    }

    let url = state.gateway.graphql_url().to_string();
    super::forward_with_refresh(
        &state,
        &headers,
        &url,
        ForwardOptions::post_json(body),
        refresh_exempt,
    )
    .await
}
