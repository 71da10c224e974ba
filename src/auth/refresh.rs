//! Token refresh coordination. Multiple in-flight requests may discover an
//! expired access token at the same instant; per session, exactly one
//! upstream exchange runs and every waiting caller receives its outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::proxy::Gateway;
use crate::upstream::{self, TokenPair};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    /// The upstream rejected the refresh token. Terminal: the session must
    /// be torn down and the exchange never retried.
    #[error("refresh token rejected")]
    Rejected,
    #[error("no refresh token available")]
    Missing,
    #[error("refresh exchange failed: {0}")]
    Transport(String),
    #[error("refresh exchange timed out")]
    TimedOut,
}

/// The single network hop of a refresh: one token in, a rotated pair out.
/// Injected so tests can script the exchange without a server.
#[async_trait]
pub trait RefreshBackend: Send + Sync {
    async fn exchange(&self, refresh_token: &str) -> Result<TokenPair, RefreshError>;
}

type Outcome = Result<TokenPair, RefreshError>;

/// At-most-one in-flight refresh per session, keyed by refresh token. The
/// first caller for a key becomes the leader and performs the exchange;
/// later callers subscribe and are released with the leader's outcome. The
/// registry lock is only ever held across map operations, never across an
/// await.
pub struct RefreshCoordinator {
    backend: Arc<dyn RefreshBackend>,
    timeout: Duration,
    in_flight: Mutex<HashMap<String, broadcast::Sender<Outcome>>>,
}

enum Role {
    Leader,
    Waiter(broadcast::Receiver<Outcome>),
}

impl RefreshCoordinator {
    pub fn new(backend: Arc<dyn RefreshBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn ensure_fresh(&self, refresh_token: &str) -> Outcome {
        if refresh_token.is_empty() {
            return Err(RefreshError::Missing);
        }

        let role = {
            let mut map = self.lock_registry();
            match map.get(refresh_token) {
                Some(sender) => Role::Waiter(sender.subscribe()),
                None => {
                    let (sender, _) = broadcast::channel(1);
                    map.insert(refresh_token.to_string(), sender);
                    Role::Leader
                }
            }
        };

        match role {
            Role::Leader => self.lead(refresh_token).await,
            Role::Waiter(receiver) => self.wait(receiver).await,
        }
    }

    async fn lead(&self, refresh_token: &str) -> Outcome {
        tracing::info!("refreshing access token");
        let outcome =
            match tokio::time::timeout(self.timeout, self.backend.exchange(refresh_token)).await {
                Ok(result) => result,
                Err(_) => Err(RefreshError::TimedOut),
            };

        if let Err(err) = &outcome {
            tracing::warn!("token refresh failed: {err}");
        }

        // Remove the entry before broadcasting so a caller arriving after
        // this window starts a fresh attempt instead of joining a settled one.
        let sender = self.lock_registry().remove(refresh_token);
        if let Some(sender) = sender {
            let _ = sender.send(outcome.clone());
        }
        outcome
    }

    async fn wait(&self, mut receiver: broadcast::Receiver<Outcome>) -> Outcome {
        // Slightly longer than the leader's bound so the leader always
        // settles first.
        let bound = self.timeout + Duration::from_secs(1);
        match tokio::time::timeout(bound, receiver.recv()).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) | Err(_) => Err(RefreshError::TimedOut),
        }
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<Outcome>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Production backend: the refresh mutation through the proxy gateway. The
/// exchange runs with loopback identity; the shared secret still
/// authenticates the proxy itself.
pub struct UpstreamRefresher {
    gateway: Arc<Gateway>,
}

impl UpstreamRefresher {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl RefreshBackend for UpstreamRefresher {
    async fn exchange(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let payload = upstream::refresh_tokens(refresh_token);

        // Carry the token in the forwarded cookie as well, matching how
        // every other upstream call transports credentials.
        let mut headers = HeaderMap::new();
        let cookie = format!("{}={}", super::cookies::REFRESH_TOKEN, refresh_token);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.insert("cookie", value);
        }

        let response = self.gateway.graphql_json(&headers, &payload).await;

        if response.status == StatusCode::UNAUTHORIZED {
            return Err(RefreshError::Rejected);
        }
        if !response.status.is_success() {
            return Err(RefreshError::Transport(format!(
                "upstream returned {}",
                response.status
            )));
        }

        let envelope = upstream::Envelope::parse(&response.body)
            .map_err(|err| RefreshError::Transport(format!("invalid response body: {err}")))?;

        if envelope.first_error().is_some() {
            // A GraphQL-level rejection of the token is as terminal as a 401.
            return Err(RefreshError::Rejected);
        }

        envelope
            .field(upstream::REFRESH_TOKENS_FIELD)
            .and_then(upstream::token_pair_from)
            .ok_or_else(|| RefreshError::Transport("missing token pair in response".to_string()))
    }
}
