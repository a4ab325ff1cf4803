use std::fmt;
use std::sync::Arc;

use artpool_model::PoolConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::{ArtworkTarget, FsCatalog, MediaCatalog};
use crate::error::Result;
use crate::fetch::{HttpImageFetcher, ImageFetcher};
use crate::pool::PoolResolver;
use crate::providers::{ImageProvider, ProviderRegistry, TmdbImageProvider};
use crate::state::RotationStateStore;

/// Everything one run needs, resolved once and passed down explicitly.
#[derive(Clone)]
pub struct RunContext {
    pub config: Arc<PoolConfig>,
    pub catalog: Arc<dyn MediaCatalog>,
    pub providers: ProviderRegistry,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub artwork_target: ArtworkTarget,
    pub resolver: PoolResolver,
    pub rotation_state: RotationStateStore,
    pub cancel: CancellationToken,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("providers", &self.providers)
            .field("artwork_target", &self.artwork_target)
            .field("state", &self.rotation_state.path())
            .finish_non_exhaustive()
    }
}

impl RunContext {
    pub fn new(
        config: PoolConfig,
        catalog: Arc<dyn MediaCatalog>,
        providers: ProviderRegistry,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let artwork_target = ArtworkTarget::probe(catalog.as_ref());
        Self {
            resolver: PoolResolver::new(&config),
            rotation_state: RotationStateStore::new(&config.state_dir),
            config: Arc::new(config),
            catalog,
            providers,
            fetcher,
            artwork_target,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Filesystem catalog, HTTP fetcher and every provider the config
    /// enables, sharing one HTTP client.
    pub fn from_config(config: PoolConfig) -> Result<Self> {
        let http = HttpImageFetcher::default_client()?;

        let mut providers: Vec<Arc<dyn ImageProvider>> = Vec::new();
        if let Some(tmdb) = TmdbImageProvider::from_config(http.clone(), &config.tmdb) {
            providers.push(Arc::new(tmdb));
        }
        let providers = ProviderRegistry::new(providers);
        info!("Resolved {} image provider(s): {:?}", providers.len(), providers);

        let catalog: Arc<dyn MediaCatalog> = Arc::new(FsCatalog::new(&config));
        let fetcher: Arc<dyn ImageFetcher> = Arc::new(HttpImageFetcher::new(http));
        Ok(Self::new(config, catalog, providers, fetcher))
    }
}
