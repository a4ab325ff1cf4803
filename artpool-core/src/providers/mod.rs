//! Image provider port and the run-wide provider list.

pub mod error;
pub mod tmdb;

use std::fmt;
use std::sync::Arc;

use artpool_model::{Candidate, CatalogItem, ImageKind};
use async_trait::async_trait;

pub use error::ProviderError;
pub use tmdb::TmdbImageProvider;

/// A source of candidate artwork for catalog items.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap check made before any network call.
    fn supports(&self, item: &CatalogItem) -> bool;

    /// Candidates of `kind` for `item`, in the provider's own order.
    async fn candidates(
        &self,
        item: &CatalogItem,
        kind: ImageKind,
    ) -> Result<Vec<Candidate>, ProviderError>;
}

/// Static preference used to order providers; lower is tried first.
pub fn preference_score(name: &str) -> u8 {
    let normalized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    match normalized.as_str() {
        "tmdb" | "themoviedb" => 0,
        "fanart" | "fanarttv" => 1,
        "tvdb" | "thetvdb" => 2,
        _ => 10,
    }
}

/// Providers resolved once per run, sorted by preference then name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ImageProvider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.name()))
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new(mut providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        providers.sort_by(|a, b| {
            preference_score(a.name())
                .cmp(&preference_score(b.name()))
                .then_with(|| a.name().cmp(b.name()))
        });
        Self { providers }
    }

    pub fn image_providers(&self) -> &[Arc<dyn ImageProvider>] {
        &self.providers
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}
