use std::sync::Arc;

use crate::cache::SwrCache;
use crate::config::AppConfig;
use crate::error::IxcError;
use crate::schemas::{ClienteInadimplente, FluxoResumo};
use crate::services::enrichment::DetalheCache;
use crate::services::ixc::IxcClient;

/// Process-wide shared state. The caches live here, one instance per process
/// handed to every request handler, instead of hiding behind module-level
/// globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub ixc: Option<Arc<IxcClient>>,
    pub fluxo_cache: Arc<SwrCache<FluxoResumo>>,
    pub roster_cache: Arc<SwrCache<Arc<Vec<ClienteInadimplente>>>>,
    pub detalhe_cache: DetalheCache,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        // The IXC host serves a self-signed certificate; validation is relaxed
        // for this single internal integration.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(config.ixc_request_timeout)
            .build()?;

        let ixc = match (&config.ixc_base_url, &config.ixc_token) {
            (Some(base_url), Some(token)) => {
                Some(Arc::new(IxcClient::new(http, base_url, token)))
            }
            _ => None,
        };

        let detalhe_cache: DetalheCache = DetalheCache::builder()
            .time_to_live(config.detail_cache_ttl)
            .build();

        Ok(Self {
            fluxo_cache: Arc::new(SwrCache::new(config.fluxo_cache_ttl)),
            roster_cache: Arc::new(SwrCache::new(config.roster_cache_ttl)),
            detalhe_cache,
            ixc,
            config: Arc::new(config),
        })
    }

    pub fn ixc_client(&self) -> Result<Arc<IxcClient>, IxcError> {
        self.ixc.clone().ok_or(IxcError::NotConfigured)
    }
}
