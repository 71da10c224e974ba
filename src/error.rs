use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Route-level error taxonomy. Every variant is converted to a JSON
/// `{error, success: false}` body at the handler boundary; raw errors and
/// stack traces never reach the browser.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input, rejected before any upstream call.
    #[error("{0}")]
    Input(String),

    /// Bad password or bad second factor. The message distinguishes only
    /// which method was attempted, never which field was wrong.
    #[error("{message}")]
    AuthChallenge { status: StatusCode, message: String },

    /// Network failure, non-JSON body, or unexpected status from upstream.
    /// The detail is logged; the caller sees an opaque message.
    #[error("authentication server unavailable")]
    UpstreamTransport(String),

    /// Refresh token invalid, expired, or absent. Terminal for the session.
    #[error("session expired")]
    RefreshFailure,

    /// Fetch exception inside the gateway. Never escapes as a raw error.
    #[error("proxy error")]
    ProxyInternal(String),
}

impl ApiError {
    pub fn input(message: impl Into<String>) -> Self {
        ApiError::Input(message.into())
    }

    pub fn challenge(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::AuthChallenge {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Input(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::AuthChallenge { status, message } => (status, message),
            ApiError::UpstreamTransport(detail) => {
                tracing::error!("upstream transport failure: {detail}");
                (
                    StatusCode::BAD_GATEWAY,
                    "Kimlik doğrulama sunucusuna ulaşılamıyor".to_string(),
                )
            }
            ApiError::RefreshFailure => (
                StatusCode::UNAUTHORIZED,
                "Oturum süresi doldu, lütfen tekrar giriş yapın".to_string(),
            ),
            ApiError::ProxyInternal(detail) => {
                tracing::error!("proxy failure: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Sunucu hatası".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "success": false
        }));

        (status, body).into_response()
    }
}
