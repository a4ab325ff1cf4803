//! The host media catalog as seen by the engine.

pub mod fs;

use std::path::{Path, PathBuf};

use artpool_model::{CatalogItem, ItemKind};
use async_trait::async_trait;
use tracing::{debug, warn};

pub use fs::FsCatalog;

use crate::pool::PoolLocation;

/// Failure to enumerate items. The only error that aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Library root unavailable: {}", .0.display())]
    RootUnavailable(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    Other(String),
}

/// Outcome of a best-effort call into the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The catalog does not implement this operation. Expected; not logged
    /// above debug.
    #[error("operation not supported by catalog")]
    Unsupported,

    #[error("catalog operation failed: {0}")]
    Failed(String),
}

/// What a catalog implementation can do beyond enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogCapabilities {
    /// Resolves and repoints the displayed artwork itself.
    pub manages_artwork: bool,
}

#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Items of the given kinds, in a stable order.
    async fn eligible_items(&self, kinds: &[ItemKind]) -> Result<Vec<CatalogItem>, CatalogError>;

    fn capabilities(&self) -> CatalogCapabilities;

    /// Path of the artwork the catalog currently displays for `item`.
    async fn current_artwork(&self, item: &CatalogItem) -> Result<Option<PathBuf>, CollaboratorError>;

    /// Point the catalog's displayed artwork at `path`.
    async fn set_artwork(&self, item: &CatalogItem, path: &Path) -> Result<(), CollaboratorError>;

    async fn notify_artwork_changed(&self, item: &CatalogItem) -> Result<(), CollaboratorError>;

    fn library_root(&self, item: &CatalogItem) -> Option<PathBuf> {
        item.library_root.clone()
    }
}

/// How promoted artwork reaches the catalog, chosen once per run from the
/// catalog's capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkTarget {
    /// Copy over the path the catalog reports, then ask it to repoint.
    CatalogManaged,
    /// Copy to the conventional `poster.<ext>` / `<stem>-poster.<ext>` file.
    Convention,
}

impl ArtworkTarget {
    pub fn probe(catalog: &dyn MediaCatalog) -> Self {
        let target = if catalog.capabilities().manages_artwork {
            ArtworkTarget::CatalogManaged
        } else {
            ArtworkTarget::Convention
        };
        debug!(?target, "selected artwork target");
        target
    }

    /// Destination for a promoted member with extension `ext`.
    pub async fn destination(
        self,
        catalog: &dyn MediaCatalog,
        item: &CatalogItem,
        location: &PoolLocation,
        ext: &str,
    ) -> PathBuf {
        if self == ArtworkTarget::CatalogManaged {
            match catalog.current_artwork(item).await {
                Ok(Some(path)) => return path,
                Ok(None) | Err(CollaboratorError::Unsupported) => {}
                Err(err) => {
                    warn!(item = %item.id, error = %err, "catalog could not resolve artwork path");
                }
            }
        }
        location.artwork_path(ext)
    }
}
