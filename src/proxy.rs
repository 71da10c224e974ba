//! Server-side relay between the browser and the upstream API. The browser
//! never learns the upstream origin or the shared proxy secret; trusted
//! network-identity headers are attached here and cannot be spoofed.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::{json, Value};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    graphql_url: String,
    upload_url: String,
    proxy_secret: String,
}

#[derive(Debug, Clone)]
pub struct ForwardOptions {
    pub method: Method,
    pub body: Option<Bytes>,
    /// Defaults to `application/json` when absent; uploads pass their
    /// multipart content type through so the boundary survives.
    pub content_type: Option<HeaderValue>,
    /// Replaces the inbound `Cookie` header when replaying with rotated
    /// tokens.
    pub cookie_override: Option<String>,
}

impl ForwardOptions {
    pub fn post_json(body: Bytes) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            content_type: None,
            cookie_override: None,
        }
    }
}

/// What came back from upstream, reduced to the parts we relay: status, the
/// full list of `Set-Cookie` headers (never just the first), content type,
/// and the raw body.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub set_cookies: Vec<HeaderValue>,
    pub body: Bytes,
}

impl UpstreamResponse {
    fn synthesized(status: StatusCode, message: &str) -> Self {
        let body = serde_json::to_vec(&json!({ "error": message, "success": false }))
            .unwrap_or_default();
        Self {
            status,
            content_type: Some(HeaderValue::from_static("application/json")),
            set_cookies: Vec::new(),
            body: Bytes::from(body),
        }
    }
}

impl Gateway {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            graphql_url: config.graphql_url(),
            upload_url: config.upload_url(),
            proxy_secret: config.proxy_secret.clone(),
        }
    }

    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Real client IP as seen at our edge: first `X-Forwarded-For` entry,
    /// then `X-Real-IP`, then a loopback placeholder.
    pub fn client_ip(headers: &HeaderMap) -> String {
        if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            if let Some(first) = xff.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
        if let Some(real) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
            let real = real.trim();
            if !real.is_empty() {
                return real.to_string();
            }
        }
        "127.0.0.1".to_string()
    }

    /// Relay a request to `url`. Never returns an error: transport failures
    /// come back as a synthesized 500 JSON body.
    pub async fn forward(
        &self,
        inbound: &HeaderMap,
        url: &str,
        opts: ForwardOptions,
    ) -> UpstreamResponse {
        let mut outbound = HeaderMap::new();

        if let Ok(secret) = HeaderValue::from_str(&self.proxy_secret) {
            outbound.insert("x-proxy-secret", secret);
        }
        if let Ok(ip) = HeaderValue::from_str(&Self::client_ip(inbound)) {
            outbound.insert("x-original-user-ip", ip);
        }
        if let Some(agent) = inbound.get(header::USER_AGENT) {
            outbound.insert("x-original-user-agent", agent.clone());
        }
        if let Some(auth) = inbound.get(header::AUTHORIZATION) {
            outbound.insert(header::AUTHORIZATION, auth.clone());
        }
        match &opts.cookie_override {
            Some(cookie) => {
                if let Ok(value) = HeaderValue::from_str(cookie) {
                    outbound.insert(header::COOKIE, value);
                }
            }
            None => {
                if let Some(cookie) = inbound.get(header::COOKIE) {
                    outbound.insert(header::COOKIE, cookie.clone());
                }
            }
        }
        let content_type = opts
            .content_type
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        outbound.insert(header::CONTENT_TYPE, content_type);

        let mut request = self.http.request(opts.method, url).headers(outbound);
        if let Some(body) = opts.body {
            request = request.body(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("upstream request failed: {err}");
                return UpstreamResponse::synthesized(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Sunucu hatası",
                );
            }
        };

        let status = response.status();
        let set_cookies: Vec<HeaderValue> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .cloned()
            .collect();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                tracing::error!("failed to read upstream body: {err}");
                return UpstreamResponse::synthesized(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Sunucu hatası",
                );
            }
        };

        UpstreamResponse {
            status,
            content_type,
            set_cookies,
            body,
        }
    }

    /// POST a GraphQL payload to the upstream endpoint.
    pub async fn graphql_json(&self, inbound: &HeaderMap, payload: &Value) -> UpstreamResponse {
        let body = Bytes::from(serde_json::to_vec(payload).unwrap_or_default());
        let url = self.graphql_url.clone();
        self.forward(inbound, &url, ForwardOptions::post_json(body))
            .await
    }
}
