//! Wire contract with the upstream GraphQL API: mutation documents, the
//! response envelope, and token-pair extraction.

use serde::Deserialize;
use serde_json::{json, Value};

pub const START_PASSWORD_LOGIN_FIELD: &str = "Admin_startPasswordLogin";
pub const VERIFY_TOTP_FIELD: &str = "Admin_verifyTotp";
pub const VERIFY_BACKUP_CODE_FIELD: &str = "Admin_verifyBackupCode";
pub const REFRESH_TOKENS_FIELD: &str = "Admin_refreshTokens";

pub fn start_password_login(email: &str, password: &str) -> Value {
    json!({
        "operationName": "StartPasswordLogin",
        "query": "mutation StartPasswordLogin($email: String!, $password: String!) { Admin_startPasswordLogin(email: $email, password: $password) { challengeToken } }",
        "variables": { "email": email, "password": password },
    })
}

pub fn verify_totp(challenge_token: &str, totp_code: &str) -> Value {
    json!({
        "operationName": "VerifyTotp",
        "query": "mutation VerifyTotp($challengeToken: String!, $totpCode: String!) { Admin_verifyTotp(challengeToken: $challengeToken, totpCode: $totpCode) { accessToken refreshToken } }",
        "variables": { "challengeToken": challenge_token, "totpCode": totp_code },
    })
}

pub fn verify_backup_code(challenge_token: &str, backup_code: &str) -> Value {
    json!({
        "operationName": "VerifyBackupCode",
        "query": "mutation VerifyBackupCode($challengeToken: String!, $backupCode: String!) { Admin_verifyBackupCode(challengeToken: $challengeToken, backupCode: $backupCode) { accessToken refreshToken } }",
        "variables": { "challengeToken": challenge_token, "backupCode": backup_code },
    })
}

pub fn refresh_tokens(refresh_token: &str) -> Value {
    json!({
        "operationName": "RefreshTokens",
        "query": "mutation RefreshTokens($refreshToken: String!) { Admin_refreshTokens(refreshToken: $refreshToken) { accessToken refreshToken } }",
        "variables": { "refreshToken": refresh_token },
    })
}

/// An access/refresh pair as returned by the verify and refresh mutations.
/// Opaque pass-through credentials; never inspected, never persisted beyond
/// the response that carries them into cookies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

/// Standard GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub data: Option<Value>,
    pub errors: Option<Vec<GraphqlError>>,
}

impl Envelope {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn first_error(&self) -> Option<&str> {
        self.errors
            .as_ref()
            .and_then(|errs| errs.first())
            .map(|e| e.message.as_str())
    }

    /// The result object of a top-level field, if present and non-null.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.as_ref()?.get(name).filter(|v| !v.is_null())
    }
}

/// Extract the challenge token from the login mutation's result. Accepts
/// either the object form `{challengeToken}` or a bare string scalar.
pub fn challenge_token_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(_) => value
            .get("challengeToken")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Extract a token pair from a mutation result object. Both fields must be
/// present, string-typed, and non-empty.
pub fn token_pair_from(value: &Value) -> Option<TokenPair> {
    let access = value.get("accessToken")?.as_str()?;
    let refresh = value.get("refreshToken")?.as_str()?;
    if access.is_empty() || refresh.is_empty() {
        return None;
    }
    Some(TokenPair {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
    })
}

/// Scan a response `data` object for an embedded token pair in any top-level
/// mutation result, so the proxy can mirror upstream-issued credentials into
/// cookies.
pub fn scan_for_token_pair(data: &Value) -> Option<TokenPair> {
    let fields = data.as_object()?;
    fields.values().find_map(token_pair_from)
}

/// Whether a proxied GraphQL payload is itself the refresh exchange. A 401
/// on this operation is terminal and must not trigger another refresh.
pub fn is_refresh_operation(payload: &Value) -> bool {
    payload
        .get("query")
        .and_then(Value::as_str)
        .map(|q| q.contains(REFRESH_TOKENS_FIELD))
        .unwrap_or(false)
}

/// Operation name for request logging, when the client supplied one.
pub fn operation_name(payload: &Value) -> Option<&str> {
    payload.get("operationName").and_then(Value::as_str)
}
