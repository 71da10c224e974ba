use axum::http::{HeaderMap, HeaderValue};
use chrono::{TimeZone, Utc};
use std::time::Duration;

use crate::config::TokenTtls;

pub const ACCESS_TOKEN: &str = "accessToken";
pub const REFRESH_TOKEN: &str = "refreshToken";
pub const CHALLENGE_TOKEN: &str = "challengeToken";
pub const ADMIN_EMAIL: &str = "adminEmail";

pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Option<i64>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

pub fn set_cookie(headers: &mut HeaderMap, name: &str, value: &str, options: CookieOptions) {
    let mut cookie = format!("{}={}", name, value);

    if options.http_only {
        cookie.push_str("; HttpOnly");
    }

    if options.secure {
        cookie.push_str("; Secure");
    }

    cookie.push_str(&format!("; SameSite={}", options.same_site));
    cookie.push_str(&format!("; Path={}", options.path));

    if let Some(max_age) = options.max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
        if max_age == 0 {
            // Expired Expires attribute for clients that ignore Max-Age=0.
            let epoch = Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now);
            cookie.push_str(&format!(
                "; Expires={}",
                epoch.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
        }
    }

    if let Ok(header_value) = HeaderValue::from_str(&cookie) {
        headers.append("Set-Cookie", header_value);
    }
}

pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get("cookie")?;
    let cookie_str = cookie_header.to_str().ok()?;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((cookie_name, cookie_value)) = cookie.split_once('=') {
            if cookie_name.trim() == name {
                return Some(cookie_value.trim().to_string());
            }
        }
    }

    None
}

/// Rebuild a `Cookie` request header with rotated token values, preserving
/// every other cookie the browser sent. Used when replaying a request after
/// a refresh.
pub fn with_rotated_tokens(headers: &HeaderMap, access: &str, refresh: &str) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(cookie_str) = headers.get("cookie").and_then(|v| v.to_str().ok()) {
        for cookie in cookie_str.split(';') {
            let cookie = cookie.trim();
            if cookie.is_empty() {
                continue;
            }
            match cookie.split_once('=') {
                Some((name, _)) if name.trim() == ACCESS_TOKEN || name.trim() == REFRESH_TOKEN => {}
                _ => parts.push(cookie.to_string()),
            }
        }
    }

    parts.push(format!("{}={}", ACCESS_TOKEN, access));
    parts.push(format!("{}={}", REFRESH_TOKEN, refresh));
    parts.join("; ")
}

/// The sole owner of auth cookie names and attributes. Token values are read
/// out of the request per call and never cached anywhere else.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    secure: bool,
    ttls: TokenTtls,
}

impl CredentialStore {
    pub fn new(secure: bool, ttls: TokenTtls) -> Self {
        Self { secure, ttls }
    }

    fn token_options(&self, max_age: Duration) -> CookieOptions {
        CookieOptions {
            secure: self.secure,
            max_age: Some(max_age.as_secs() as i64),
            ..Default::default()
        }
    }

    pub fn issue_challenge(&self, headers: &mut HeaderMap, token: &str) {
        set_cookie(
            headers,
            CHALLENGE_TOKEN,
            token,
            self.token_options(self.ttls.challenge),
        );
    }

    pub fn issue_token_pair(&self, headers: &mut HeaderMap, access: &str, refresh: &str) {
        set_cookie(
            headers,
            ACCESS_TOKEN,
            access,
            self.token_options(self.ttls.access),
        );
        set_cookie(
            headers,
            REFRESH_TOKEN,
            refresh,
            self.token_options(self.ttls.refresh),
        );
    }

    /// The admin email is the one value the UI is allowed to read, so it is
    /// not HttpOnly; Secure/SameSite policy stays the same as the tokens.
    pub fn set_admin_email(&self, headers: &mut HeaderMap, email: &str) {
        set_cookie(
            headers,
            ADMIN_EMAIL,
            email,
            CookieOptions {
                http_only: false,
                secure: self.secure,
                max_age: Some(self.ttls.refresh.as_secs() as i64),
                ..Default::default()
            },
        );
    }

    pub fn clear_challenge(&self, headers: &mut HeaderMap) {
        self.expire(headers, CHALLENGE_TOKEN, true);
    }

    pub fn clear_all(&self, headers: &mut HeaderMap) {
        self.expire(headers, ACCESS_TOKEN, true);
        self.expire(headers, REFRESH_TOKEN, true);
        self.expire(headers, CHALLENGE_TOKEN, true);
        self.expire(headers, ADMIN_EMAIL, false);
    }

    fn expire(&self, headers: &mut HeaderMap, name: &str, http_only: bool) {
        set_cookie(
            headers,
            name,
            "",
            CookieOptions {
                http_only,
                secure: self.secure,
                max_age: Some(0),
                ..Default::default()
            },
        );
    }

    pub fn access_token(headers: &HeaderMap) -> Option<String> {
        get_cookie_value(headers, ACCESS_TOKEN).filter(|v| !v.is_empty())
    }

    pub fn refresh_token(headers: &HeaderMap) -> Option<String> {
        get_cookie_value(headers, REFRESH_TOKEN).filter(|v| !v.is_empty())
    }

    pub fn challenge_token(headers: &HeaderMap) -> Option<String> {
        get_cookie_value(headers, CHALLENGE_TOKEN).filter(|v| !v.is_empty())
    }

    pub fn admin_email(headers: &HeaderMap) -> Option<String> {
        get_cookie_value(headers, ADMIN_EMAIL).filter(|v| !v.is_empty())
    }
}
