use std::time::Duration;

/// Token lifetimes used by every issuance site. Single source of truth:
/// nothing else in the crate hardcodes a TTL.
#[derive(Debug, Clone)]
pub struct TokenTtls {
    pub challenge: Duration,
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            challenge: Duration::from_secs(5 * 60),
            access: Duration::from_secs(60 * 60),
            refresh: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the upstream GraphQL API, e.g. `https://api.15minutes.app`.
    pub upstream_url: String,
    /// Path of the GraphQL endpoint on the upstream, joined onto `upstream_url`.
    pub graphql_path: String,
    /// Path of the thumbnail upload endpoint on the upstream.
    pub upload_path: String,
    /// Shared secret the upstream uses to trust our identity headers.
    pub proxy_secret: String,
    /// Controls the `Secure` attribute on every cookie we issue.
    pub production: bool,
    pub port: u16,
    /// Dashboard origin allowed to call us cross-origin, if any.
    pub allowed_origin: Option<String>,
    pub ttls: TokenTtls,
    /// Upper bound on a single refresh exchange; an elapsed timeout resolves
    /// every queued caller with failure instead of hanging them.
    pub refresh_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let upstream_url = std::env::var("UPSTREAM_API_URL")
            .map_err(|_| anyhow::anyhow!("UPSTREAM_API_URL must be set"))?;
        let proxy_secret = std::env::var("PROXY_SECRET")
            .map_err(|_| anyhow::anyhow!("PROXY_SECRET must be set"))?;

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        Ok(Self {
            upstream_url: upstream_url.trim_end_matches('/').to_string(),
            graphql_path: env_or("UPSTREAM_GRAPHQL_PATH", "/graphql"),
            upload_path: env_or("UPSTREAM_UPLOAD_PATH", "/upload/thumbnail"),
            proxy_secret,
            production: env_flag("PRODUCTION"),
            port,
            allowed_origin: std::env::var("ALLOWED_ORIGIN").ok(),
            ttls: TokenTtls {
                challenge: env_duration("CHALLENGE_TOKEN_TTL_SECS", 5 * 60),
                access: env_duration("ACCESS_TOKEN_TTL_SECS", 60 * 60),
                refresh: env_duration("REFRESH_TOKEN_TTL_SECS", 30 * 24 * 60 * 60),
            },
            refresh_timeout: env_duration("REFRESH_TIMEOUT_SECS", 10),
        })
    }

    pub fn graphql_url(&self) -> String {
        format!("{}{}", self.upstream_url, self.graphql_path)
    }

    pub fn upload_url(&self) -> String {
        format!("{}{}", self.upstream_url, self.upload_path)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}

fn env_duration(key: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}
