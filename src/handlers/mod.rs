pub mod auth;
pub mod graphql;
pub mod upload;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::cookies::{self, CredentialStore};
use crate::proxy::{ForwardOptions, UpstreamResponse};
use crate::upstream;
use crate::AppState;

/// Terminal session failure: expire every auth cookie and tell the client to
/// start over at the login screen.
pub(crate) fn session_teardown(store: &CredentialStore) -> Response {
    let mut cookies = HeaderMap::new();
    store.clear_all(&mut cookies);
    let body = Json(json!({
        "error": "Oturum süresi doldu, lütfen tekrar giriş yapın",
        "success": false
    }));
    (StatusCode::UNAUTHORIZED, cookies, body).into_response()
}

/// Convert an upstream response into ours: status and body pass through,
/// every upstream `Set-Cookie` is re-emitted, and any extra headers (rotated
/// or mirrored token cookies) are appended.
pub(crate) fn proxied_response(state: &AppState, upstream: UpstreamResponse) -> Response {
    let mut extra = HeaderMap::new();

    // The upstream may embed a freshly issued token pair in a mutation
    // result; mirror it into cookies so the browser converges.
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&upstream.body) {
        if let Some(pair) = value.get("data").and_then(upstream::scan_for_token_pair) {
            state
                .store
                .issue_token_pair(&mut extra, &pair.access_token, &pair.refresh_token);
        }
    }

    proxied_response_with(upstream, extra)
}

pub(crate) fn proxied_response_with(upstream: UpstreamResponse, extra: HeaderMap) -> Response {
    let mut response = (upstream.status, upstream.body).into_response();
    let headers = response.headers_mut();

    match upstream.content_type {
        Some(content_type) => {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        None => {
            headers.remove(header::CONTENT_TYPE);
        }
    }

    for cookie in upstream.set_cookies {
        headers.append(header::SET_COOKIE, cookie);
    }
    for (name, value) in extra.iter() {
        headers.append(name, value.clone());
    }

    response
}

/// Forward a request; on a 401 (other than from the refresh exchange
/// itself) obtain fresh credentials through the shared coordinator and
/// replay the original request with rotated cookies. The rotated pair is
/// appended to the final response so the browser's cookies converge.
pub(crate) async fn forward_with_refresh(
    state: &AppState,
    inbound: &HeaderMap,
    url: &str,
    opts: ForwardOptions,
    refresh_exempt: bool,
) -> Response {
    let first = state.gateway.forward(inbound, url, opts.clone()).await;

    if first.status != StatusCode::UNAUTHORIZED || refresh_exempt {
        return proxied_response(state, first);
    }

    let Some(refresh_token) = CredentialStore::refresh_token(inbound) else {
        return session_teardown(&state.store);
    };

    match state.coordinator.ensure_fresh(&refresh_token).await {
        Ok(pair) => {
            let mut retry = opts;
            retry.cookie_override = Some(cookies::with_rotated_tokens(
                inbound,
                &pair.access_token,
                &pair.refresh_token,
            ));
            let second = state.gateway.forward(inbound, url, retry).await;

            let mut rotated = HeaderMap::new();
            state
                .store
                .issue_token_pair(&mut rotated, &pair.access_token, &pair.refresh_token);
            proxied_response_with(second, rotated)
        }
        Err(err) => {
            tracing::warn!("session refresh failed during replay: {err}");
            session_teardown(&state.store)
        }
    }
}
