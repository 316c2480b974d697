use std::sync::Arc;

use crate::{
    backend::BackendRegistry,
    config::ProxyConfig,
    errors::ConfigError,
    metrics::AppMetrics,
    random::{RandomSource, ThreadRandom},
    transport::{http::HttpLineTransport, ChunkTransport},
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ProxyConfig>,
    pub registry: Arc<BackendRegistry>,
    pub transport: Arc<dyn ChunkTransport>,
    pub random: Arc<dyn RandomSource>,
    pub http: reqwest::Client,
    pub metrics: Arc<AppMetrics>,
}

impl AppState {
    pub fn new(settings: ProxyConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(settings.upstream_timeout)
            .build()
            .map_err(|error| ConfigError::HttpClient(error.to_string()))?;
        let transport: Arc<dyn ChunkTransport> = Arc::new(HttpLineTransport::new(http.clone()));
        let random: Arc<dyn RandomSource> = Arc::new(ThreadRandom);
        Ok(Self::assemble(settings, transport, random, http))
    }

    /// Test constructor: swaps in scripted collaborators while keeping the
    /// production wiring everywhere else.
    pub fn with_collaborators(
        settings: ProxyConfig,
        transport: Arc<dyn ChunkTransport>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self::assemble(settings, transport, random, reqwest::Client::new())
    }

    fn assemble(
        settings: ProxyConfig,
        transport: Arc<dyn ChunkTransport>,
        random: Arc<dyn RandomSource>,
        http: reqwest::Client,
    ) -> Self {
        let registry = Arc::new(BackendRegistry::new(settings.backends.clone()));
        Self {
            settings: Arc::new(settings),
            registry,
            transport,
            random,
            http,
            metrics: Arc::new(AppMetrics::new()),
        }
    }
}
