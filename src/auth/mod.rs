pub mod challenge;
pub mod cookies;
pub mod refresh;

use axum::http::HeaderMap;
use serde::Serialize;

use cookies::CredentialStore;

/// The client-observable session, derived from the credential store on every
/// read. Cookies are the durable state; nothing here is cached in memory.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub is_authenticated: bool,
    pub admin_email: Option<String>,
}

impl SessionStatus {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            is_authenticated: CredentialStore::access_token(headers).is_some(),
            admin_email: CredentialStore::admin_email(headers),
        }
    }
}
