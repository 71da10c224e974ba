//! Test helpers: a scriptable mock of the upstream GraphQL API plus
//! conveniences for driving the app router with cookie-carrying requests.
//!
//! The mock enforces the shared proxy secret, issues challenge tokens for
//! the fixture password, accepts the fixture TOTP/backup codes, and rotates
//! refresh tokens on every exchange so reuse of a consumed token fails the
//! way the real upstream would.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use minutes_admin_api::auth::cookies::get_cookie_value;
use minutes_admin_api::config::{AppConfig, TokenTtls};
use minutes_admin_api::{routes, AppState};

pub const PROXY_SECRET: &str = "test-proxy-secret";
pub const ADMIN_EMAIL: &str = "admin@15minutes.app";
pub const VALID_PASSWORD: &str = "admin123";
pub const VALID_TOTP: &str = "123456";
pub const VALID_BACKUP_CODE: &str = "backup-code-1";

#[derive(Default)]
pub struct MockState {
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub challenges: Mutex<HashSet<String>>,
    pub access_tokens: Mutex<HashSet<String>>,
    pub refresh_tokens: Mutex<HashSet<String>>,
    pub refresh_delay: Mutex<Duration>,
}

impl MockState {
    fn mint_pair(&self) -> (String, String) {
        let access = format!("acc-{}", Uuid::new_v4().simple());
        let refresh = format!("ref-{}", Uuid::new_v4().simple());
        self.access_tokens.lock().unwrap().insert(access.clone());
        self.refresh_tokens.lock().unwrap().insert(refresh.clone());
        (access, refresh)
    }

    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        if let Some(token) = get_cookie_value(headers, "accessToken") {
            if self.access_tokens.lock().unwrap().contains(&token) {
                return true;
            }
        }
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .map(|token| self.access_tokens.lock().unwrap().contains(token))
            .unwrap_or(false)
    }

    pub fn seed_session(&self) -> (String, String) {
        self.mint_pair()
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }
}

fn graphql_error(message: &str) -> Response {
    Json(json!({ "data": null, "errors": [{ "message": message }] })).into_response()
}

async fn mock_graphql(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    if headers.get("x-proxy-secret").and_then(|v| v.to_str().ok()) != Some(PROXY_SECRET) {
        return (StatusCode::FORBIDDEN, graphql_error("bad proxy secret")).into_response();
    }

    let query = payload["query"].as_str().unwrap_or("");
    let vars = &payload["variables"];

    if query.contains("Admin_startPasswordLogin") {
        state.login_calls.fetch_add(1, Ordering::SeqCst);
        if vars["password"].as_str() == Some(VALID_PASSWORD) {
            let challenge = format!("chal-{}", Uuid::new_v4().simple());
            state.challenges.lock().unwrap().insert(challenge.clone());
            return Json(json!({
                "data": { "Admin_startPasswordLogin": { "challengeToken": challenge } }
            }))
            .into_response();
        }
        return graphql_error("invalid credentials");
    }

    if query.contains("Admin_verifyTotp") || query.contains("Admin_verifyBackupCode") {
        let is_backup = query.contains("Admin_verifyBackupCode");
        let challenge = vars["challengeToken"].as_str().unwrap_or("");
        let code = if is_backup {
            vars["backupCode"].as_str().unwrap_or("")
        } else {
            vars["totpCode"].as_str().unwrap_or("")
        };
        let expected = if is_backup { VALID_BACKUP_CODE } else { VALID_TOTP };

        let consumed = state.challenges.lock().unwrap().remove(challenge);
        if consumed && code == expected {
            let (access, refresh) = state.mint_pair();
            let field = if is_backup {
                "Admin_verifyBackupCode"
            } else {
                "Admin_verifyTotp"
            };
            return Json(json!({
                "data": { field: { "accessToken": access, "refreshToken": refresh } }
            }))
            .into_response();
        }
        if consumed {
            // Challenge was valid but the code was not; restore it so the
            // user can retry within the window, like the real upstream.
            state
                .challenges
                .lock()
                .unwrap()
                .insert(challenge.to_string());
        }
        return graphql_error("verification failed");
    }

    if query.contains("Admin_refreshTokens") {
        state.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *state.refresh_delay.lock().unwrap();
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        let token = vars["refreshToken"].as_str().unwrap_or("");
        let rotated = state.refresh_tokens.lock().unwrap().remove(token);
        if rotated {
            let (access, refresh) = state.mint_pair();
            return Json(json!({
                "data": { "Admin_refreshTokens": { "accessToken": access, "refreshToken": refresh } }
            }))
            .into_response();
        }
        return (StatusCode::UNAUTHORIZED, graphql_error("refresh token invalid")).into_response();
    }

    // Generic dashboard operation: requires a live access token.
    if !state.is_authenticated(&headers) {
        return (StatusCode::UNAUTHORIZED, graphql_error("unauthorized")).into_response();
    }

    if query.contains("EchoHeaders") {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };
        return Json(json!({
            "data": {
                "echo": {
                    "ip": header("x-original-user-ip"),
                    "userAgent": header("x-original-user-agent"),
                    "contentType": header("content-type"),
                }
            }
        }))
        .into_response();
    }

    if query.contains("SetCookies") {
        let mut response_headers = HeaderMap::new();
        response_headers.append("set-cookie", "upstream_a=1; Path=/".parse().unwrap());
        response_headers.append("set-cookie", "upstream_b=2; Path=/".parse().unwrap());
        return (response_headers, Json(json!({ "data": { "ok": true } }))).into_response();
    }

    if query.contains("IssueTokens") {
        let (access, refresh) = state.mint_pair();
        return Json(json!({
            "data": { "Admin_rotateSession": { "accessToken": access, "refreshToken": refresh } }
        }))
        .into_response();
    }

    Json(json!({ "data": { "ok": true } })).into_response()
}

async fn mock_upload(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if headers.get("x-proxy-secret").and_then(|v| v.to_str().ok()) != Some(PROXY_SECRET) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if !state.is_authenticated(&headers) {
        return (StatusCode::UNAUTHORIZED, graphql_error("unauthorized")).into_response();
    }

    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    Json(json!({
        "success": true,
        "contentType": content_type,
        "size": body.len(),
    }))
    .into_response()
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

pub async fn spawn_mock_upstream() -> MockUpstream {
    let state = Arc::new(MockState::default());
    let router = Router::new()
        .route("/graphql", post(mock_graphql))
        .route("/upload/thumbnail", post(mock_upload))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    MockUpstream { addr, state }
}

pub fn test_config(upstream_addr: SocketAddr) -> AppConfig {
    AppConfig {
        upstream_url: format!("http://{upstream_addr}"),
        graphql_path: "/graphql".to_string(),
        upload_path: "/upload/thumbnail".to_string(),
        proxy_secret: PROXY_SECRET.to_string(),
        production: false,
        port: 0,
        allowed_origin: None,
        ttls: TokenTtls::default(),
        refresh_timeout: Duration::from_secs(2),
    }
}

/// Full test fixture: mock upstream plus an app router pointed at it.
pub async fn test_app() -> (Router, MockUpstream) {
    let upstream = spawn_mock_upstream().await;
    let app = routes::create_router(AppState::new(test_config(upstream.addr)));
    (app, upstream)
}

pub struct RequestSpec<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub cookies: Option<&'a str>,
    pub body: Option<Value>,
    pub headers: Vec<(&'a str, &'a str)>,
}

impl<'a> RequestSpec<'a> {
    pub fn post(uri: &'a str, body: Value) -> Self {
        Self {
            method: "POST",
            uri,
            cookies: None,
            body: Some(body),
            headers: Vec::new(),
        }
    }

    pub fn get(uri: &'a str) -> Self {
        Self {
            method: "GET",
            uri,
            cookies: None,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: &'a str) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn with_header(mut self, name: &'a str, value: &'a str) -> Self {
        self.headers.push((name, value));
        self
    }
}

pub async fn send(app: &Router, spec: RequestSpec<'_>) -> Response {
    let mut builder = Request::builder().method(spec.method).uri(spec.uri);
    if let Some(cookies) = spec.cookies {
        builder = builder.header("cookie", cookies);
    }
    for (name, value) in &spec.headers {
        builder = builder.header(*name, *value);
    }

    let body = match spec.body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };

    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// All `Set-Cookie` header values on a response, in order.
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

/// The value a `Set-Cookie` list assigns to `name`, if any cookie sets it.
pub fn issued_cookie(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    cookies.iter().find_map(|cookie| {
        let rest = cookie.strip_prefix(&prefix)?;
        Some(rest.split(';').next().unwrap_or("").to_string())
    })
}

/// Run the full login + TOTP flow and return the issued (access, refresh)
/// cookie values.
pub async fn establish_session(app: &Router) -> (String, String) {
    let login = send(
        app,
        RequestSpec::post(
            "/api/auth/login",
            json!({ "email": ADMIN_EMAIL, "password": VALID_PASSWORD }),
        ),
    )
    .await;
    assert_eq!(login.status(), StatusCode::OK);
    let challenge = issued_cookie(&set_cookies(&login), "challengeToken")
        .expect("login should issue a challenge cookie");

    let cookie_header = format!("challengeToken={challenge}");
    let verify = send(
        app,
        RequestSpec::post("/api/auth/verify", json!({ "code": VALID_TOTP }))
            .with_cookies(&cookie_header),
    )
    .await;
    assert_eq!(verify.status(), StatusCode::OK);

    let cookies = set_cookies(&verify);
    let access = issued_cookie(&cookies, "accessToken").expect("access token cookie");
    let refresh = issued_cookie(&cookies, "refreshToken").expect("refresh token cookie");
    (access, refresh)
}
