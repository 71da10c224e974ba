use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::cookies::CredentialStore;
use crate::proxy::ForwardOptions;
use crate::AppState;

/// POST /api/upload/thumbnail — multipart passthrough to the upstream upload
/// endpoint. Requires an existing session; the caller's content type is
/// forwarded verbatim so the multipart boundary survives.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if CredentialStore::access_token(&headers).is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Oturum gerekli", "success": false })),
        )
            .into_response();
    }

    let opts = ForwardOptions {
        method: Method::POST,
        body: Some(body),
        content_type: headers.get(header::CONTENT_TYPE).cloned(),
        cookie_override: None,
    };

    let url = state.gateway.upload_url().to_string();
    super::forward_with_refresh(&state, &headers, &url, opts, false).await
}
