//! The two-step login state machine. Password verification issues a
//! short-lived challenge token; a second factor exchanges it for the
//! access/refresh pair. Each step is a single upstream mutation through the
//! gateway.

use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;

use crate::error::ApiError;
use crate::proxy::{Gateway, UpstreamResponse};
use crate::upstream::{self, TokenPair};

pub const MSG_LOGIN_FAILED: &str = "E-posta veya şifre hatalı";
pub const MSG_TOTP_FAILED: &str = "TOTP kodu hatalı veya süresi dolmuş";
pub const MSG_BACKUP_CODE_FAILED: &str = "Yedek kod hatalı veya daha önce kullanılmış";
pub const MSG_CHALLENGE_EXPIRED: &str = "Doğrulama süresi doldu, lütfen tekrar giriş yapın";

#[derive(Clone)]
pub struct ChallengeFlow {
    gateway: Arc<Gateway>,
}

impl ChallengeFlow {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Step 1: verify the password upstream and obtain a challenge token.
    /// Bad credentials surface as one generic message; no partial token is
    /// ever issued.
    pub async fn start_password_login(
        &self,
        inbound: &HeaderMap,
        email: &str,
        password: &str,
    ) -> Result<String, ApiError> {
        let payload = upstream::start_password_login(email, password);
        let response = self.gateway.graphql_json(inbound, &payload).await;

        let envelope = parse_envelope(&response, MSG_LOGIN_FAILED)?;
        envelope
            .field(upstream::START_PASSWORD_LOGIN_FIELD)
            .and_then(upstream::challenge_token_from)
            .ok_or_else(|| {
                ApiError::UpstreamTransport("login response missing challenge token".to_string())
            })
    }

    /// Step 2: exchange the challenge token plus exactly one second factor
    /// for the token pair. The failure message distinguishes only which
    /// method was attempted.
    pub async fn verify_second_factor(
        &self,
        inbound: &HeaderMap,
        challenge_token: &str,
        code: &str,
        use_backup_code: bool,
    ) -> Result<TokenPair, ApiError> {
        let (payload, field, failure) = if use_backup_code {
            (
                upstream::verify_backup_code(challenge_token, code),
                upstream::VERIFY_BACKUP_CODE_FIELD,
                MSG_BACKUP_CODE_FAILED,
            )
        } else {
            (
                upstream::verify_totp(challenge_token, code),
                upstream::VERIFY_TOTP_FIELD,
                MSG_TOTP_FAILED,
            )
        };

        let response = self.gateway.graphql_json(inbound, &payload).await;

        let envelope = parse_envelope(&response, failure)?;
        envelope
            .field(field)
            .and_then(upstream::token_pair_from)
            .ok_or_else(|| {
                ApiError::UpstreamTransport("verify response missing token pair".to_string())
            })
    }
}

/// Map an upstream response to the error taxonomy: 400/401 and GraphQL-level
/// errors become a challenge failure with the step-specific message; other
/// non-2xx statuses and unparseable bodies are transport failures.
fn parse_envelope(
    response: &UpstreamResponse,
    failure_message: &str,
) -> Result<upstream::Envelope, ApiError> {
    if response.status == StatusCode::UNAUTHORIZED || response.status == StatusCode::BAD_REQUEST {
        return Err(ApiError::challenge(
            StatusCode::UNAUTHORIZED,
            failure_message,
        ));
    }
    if !response.status.is_success() {
        return Err(ApiError::UpstreamTransport(format!(
            "upstream returned {}",
            response.status
        )));
    }

    let envelope = upstream::Envelope::parse(&response.body).map_err(|err| {
        ApiError::UpstreamTransport(format!("invalid upstream response body: {err}"))
    })?;

    if let Some(error) = envelope.first_error() {
        tracing::debug!("upstream rejected auth step: {error}");
        return Err(ApiError::challenge(
            StatusCode::UNAUTHORIZED,
            failure_message,
        ));
    }

    Ok(envelope)
}
