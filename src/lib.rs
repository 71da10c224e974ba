pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod routes;
pub mod upstream;

use std::sync::Arc;

use auth::challenge::ChallengeFlow;
use auth::cookies::CredentialStore;
use auth::refresh::{RefreshCoordinator, UpstreamRefresher};
use config::AppConfig;
use proxy::Gateway;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: CredentialStore,
    pub gateway: Arc<Gateway>,
    pub challenge: ChallengeFlow,
    pub coordinator: Arc<RefreshCoordinator>,
}

impl AppState {
    /// Composition root. The refresh coordinator is constructed exactly once
    /// here and shared by every outbound path; no other in-flight state
    /// exists anywhere in the process.
    pub fn new(config: AppConfig) -> Self {
        let gateway = Arc::new(Gateway::new(&config));
        let store = CredentialStore::new(config.production, config.ttls.clone());
        let challenge = ChallengeFlow::new(gateway.clone());
        let backend = Arc::new(UpstreamRefresher::new(gateway.clone()));
        let coordinator = Arc::new(RefreshCoordinator::new(backend, config.refresh_timeout));

        Self {
            config: Arc::new(config),
            store,
            gateway,
            challenge,
            coordinator,
        }
    }
}
