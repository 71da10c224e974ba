use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::challenge::MSG_CHALLENGE_EXPIRED;
use crate::auth::cookies::CredentialStore;
use crate::auth::SessionStatus;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// One code field plus a selector flag: the schema itself rules out sending
/// both factors, or neither with a dangling flag.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub use_backup_code: bool,
}

/// POST /api/auth/login — step 1 of the challenge flow.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> ApiResult<(HeaderMap, Json<Value>)> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::input("E-posta ve şifre gerekli"));
    }

    let challenge_token = state
        .challenge
        .start_password_login(&headers, request.email.trim(), &request.password)
        .await?;

    let mut response_headers = HeaderMap::new();
    state
        .store
        .issue_challenge(&mut response_headers, &challenge_token);

    tracing::info!("password step accepted, awaiting second factor");
    Ok((response_headers, Json(json!({ "success": true }))))
}

/// POST /api/auth/verify — step 2. Consumes the challenge cookie on success;
/// leaves it intact on failure so the user can retry within its window.
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<(HeaderMap, Json<Value>)> {
    let Some(challenge_token) = CredentialStore::challenge_token(&headers) else {
        return Err(ApiError::challenge(
            StatusCode::UNAUTHORIZED,
            MSG_CHALLENGE_EXPIRED,
        ));
    };

    if request.code.trim().is_empty() {
        return Err(ApiError::input("Doğrulama kodu gerekli"));
    }

    let pair = state
        .challenge
        .verify_second_factor(
            &headers,
            &challenge_token,
            request.code.trim(),
            request.use_backup_code,
        )
        .await?;

    let mut response_headers = HeaderMap::new();
    state
        .store
        .issue_token_pair(&mut response_headers, &pair.access_token, &pair.refresh_token);
    state.store.clear_challenge(&mut response_headers);

    if let Some(email) = headers.get("x-admin-email").and_then(|v| v.to_str().ok()) {
        if !email.is_empty() {
            state.store.set_admin_email(&mut response_headers, email);
        }
    }

    tracing::info!("second factor accepted, session established");
    Ok((response_headers, Json(json!({ "success": true }))))
}

/// POST /api/auth/refresh — exchange the refresh cookie for a rotated pair.
/// The token travels in the cookie only, never in the request body. A
/// failure here is terminal: the session is torn down.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(refresh_token) = CredentialStore::refresh_token(&headers) else {
        return super::session_teardown(&state.store);
    };

    match state.coordinator.ensure_fresh(&refresh_token).await {
        Ok(pair) => {
            let mut response_headers = HeaderMap::new();
            state.store.issue_token_pair(
                &mut response_headers,
                &pair.access_token,
                &pair.refresh_token,
            );
            (
                StatusCode::OK,
                response_headers,
                Json(json!({ "success": true })),
            )
                .into_response()
        }
        Err(err) => {
            tracing::warn!("refresh endpoint failed: {err}");
            super::session_teardown(&state.store)
        }
    }
}

/// POST /api/auth/logout — expire all four cookies. Idempotent; succeeds
/// whether or not a session exists.
pub async fn logout(State(state): State<AppState>) -> (HeaderMap, Json<Value>) {
    let mut response_headers = HeaderMap::new();
    state.store.clear_all(&mut response_headers);
    (response_headers, Json(json!({ "success": true })))
}

/// GET /api/auth/status — session view derived from cookies alone.
pub async fn status(headers: HeaderMap) -> Json<SessionStatus> {
    Json(SessionStatus::from_headers(&headers))
}
