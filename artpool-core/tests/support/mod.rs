//! In-memory collaborators for engine integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use artpool_core::catalog::{CatalogCapabilities, CatalogError, CollaboratorError, MediaCatalog};
use artpool_core::error::{PoolError, Result};
use artpool_core::fetch::ImageFetcher;
use artpool_core::providers::{ImageProvider, ProviderError, ProviderRegistry};
use artpool_core::{FsCatalog, RunContext};
use artpool_model::{
    Candidate, CatalogItem, ImageKind, ItemId, ItemKind, PoolConfig, RetryConfig,
};

pub const PROVIDER_NAME: &str = "FakeArt";

/// Random-noise PNG. Different seeds give fingerprints far apart.
pub fn poster(seed: u64, width: u32, height: u32) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let img = RgbImage::from_fn(width, height, |_, _| {
        Rgb([rng.random(), rng.random(), rng.random()])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode test poster");
    out.into_inner()
}

/// Catalog over a fixed item list with scriptable collaborator calls.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    items: Mutex<Vec<CatalogItem>>,
    capabilities: Mutex<CatalogCapabilities>,
    artwork: Mutex<HashMap<ItemId, PathBuf>>,
    set_artwork_error: Mutex<Option<String>>,
    pub set_artwork_calls: AtomicUsize,
    pub notify_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn push(&self, item: CatalogItem) {
        self.items.lock().unwrap().push(item);
    }

    pub fn manage_artwork(&self, item: &ItemId, path: PathBuf) {
        *self.capabilities.lock().unwrap() = CatalogCapabilities {
            manages_artwork: true,
        };
        self.artwork.lock().unwrap().insert(item.clone(), path);
    }

    pub fn fail_set_artwork(&self, message: &str) {
        *self.set_artwork_error.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl MediaCatalog for FakeCatalog {
    async fn eligible_items(&self, kinds: &[ItemKind]) -> std::result::Result<Vec<CatalogItem>, CatalogError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| kinds.contains(&item.kind))
            .cloned()
            .collect())
    }

    fn capabilities(&self) -> CatalogCapabilities {
        *self.capabilities.lock().unwrap()
    }

    async fn current_artwork(
        &self,
        item: &CatalogItem,
    ) -> std::result::Result<Option<PathBuf>, CollaboratorError> {
        if !self.capabilities().manages_artwork {
            return Err(CollaboratorError::Unsupported);
        }
        Ok(self.artwork.lock().unwrap().get(&item.id).cloned())
    }

    async fn set_artwork(
        &self,
        _item: &CatalogItem,
        _path: &Path,
    ) -> std::result::Result<(), CollaboratorError> {
        self.set_artwork_calls.fetch_add(1, Ordering::SeqCst);
        match self.set_artwork_error.lock().unwrap().clone() {
            Some(message) => Err(CollaboratorError::Failed(message)),
            None => Ok(()),
        }
    }

    async fn notify_artwork_changed(
        &self,
        _item: &CatalogItem,
    ) -> std::result::Result<(), CollaboratorError> {
        self.notify_calls.fetch_add(1, Ordering::SeqCst);
        if self.capabilities().manages_artwork {
            Ok(())
        } else {
            Err(CollaboratorError::Unsupported)
        }
    }
}

/// Provider answering from a per-item candidate table.
#[derive(Debug, Default)]
pub struct FakeProvider {
    candidates: Mutex<HashMap<ItemId, Vec<Candidate>>>,
    failing: Mutex<HashSet<ItemId>>,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn offer(&self, item: &ItemId, candidate: Candidate) {
        self.candidates
            .lock()
            .unwrap()
            .entry(item.clone())
            .or_default()
            .push(candidate);
    }

    pub fn fail_for(&self, item: &ItemId) {
        self.failing.lock().unwrap().insert(item.clone());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for FakeProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn supports(&self, _item: &CatalogItem) -> bool {
        true
    }

    async fn candidates(
        &self,
        item: &CatalogItem,
        kind: ImageKind,
    ) -> std::result::Result<Vec<Candidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&item.id) {
            return Err(ProviderError::ApiError("upstream exploded".into()));
        }
        Ok(self
            .candidates
            .lock()
            .unwrap()
            .get(&item.id)
            .map(|all| all.iter().filter(|c| c.kind == kind).cloned().collect())
            .unwrap_or_default())
    }
}

/// URL to bytes, with an optional run of 503s before a URL succeeds.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    unavailable: Mutex<HashMap<String, usize>>,
    calls: Mutex<HashMap<String, usize>>,
    cancel_on_fetch: Mutex<Option<CancellationToken>>,
}

impl FakeFetcher {
    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.bodies.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub fn unavailable_for(&self, url: &str, times: usize) {
        self.unavailable.lock().unwrap().insert(url.to_string(), times);
    }

    /// Fire `token` from inside the next fetch.
    pub fn cancel_during_fetch(&self, token: CancellationToken) {
        *self.cancel_on_fetch.lock().unwrap() = Some(token);
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _cancel: &CancellationToken) -> Result<Vec<u8>> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        if let Some(token) = self.cancel_on_fetch.lock().unwrap().take() {
            token.cancel();
        }

        if let Some(remaining) = self.unavailable.lock().unwrap().get_mut(url)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(PoolError::HttpStatus {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                url: url.to_string(),
            });
        }

        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| PoolError::HttpStatus {
                status: reqwest::StatusCode::NOT_FOUND,
                url: url.to_string(),
            })
    }
}

/// A temporary movie library plus fakes wired into a `RunContext`.
pub struct Harness {
    pub dir: TempDir,
    pub catalog: Arc<FakeCatalog>,
    pub provider: Arc<FakeProvider>,
    pub fetcher: Arc<FakeFetcher>,
    seeds: AtomicU64,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp library");
        std::fs::create_dir_all(dir.path().join("movies")).expect("create library root");
        Self {
            dir,
            catalog: Arc::new(FakeCatalog::default()),
            provider: Arc::new(FakeProvider::default()),
            fetcher: Arc::new(FakeFetcher::default()),
            seeds: AtomicU64::new(1),
        }
    }

    pub fn library_root(&self) -> PathBuf {
        self.dir.path().join("movies")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// Pool settings with no cooldown and millisecond backoff.
    pub fn config(&self, pool_size: usize) -> PoolConfig {
        PoolConfig {
            pool_size,
            min_hours_between_switches: 0.0,
            state_dir: self.state_dir(),
            retry: RetryConfig {
                max_attempts: 3,
                backoff_base_ms: 1,
                backoff_max_ms: 4,
            },
            ..PoolConfig::default()
        }
    }

    pub fn context(&self, config: PoolConfig) -> RunContext {
        let catalog: Arc<dyn MediaCatalog> = self.catalog.clone();
        let provider: Arc<dyn ImageProvider> = self.provider.clone();
        let fetcher: Arc<dyn ImageFetcher> = self.fetcher.clone();
        RunContext::new(config, catalog, ProviderRegistry::new(vec![provider]), fetcher)
    }

    /// Context with no providers at all.
    pub fn offline_context(&self, config: PoolConfig) -> RunContext {
        let catalog: Arc<dyn MediaCatalog> = self.catalog.clone();
        let fetcher: Arc<dyn ImageFetcher> = self.fetcher.clone();
        RunContext::new(config, catalog, ProviderRegistry::default(), fetcher)
    }

    /// `<root>/<title>/<title>.mkv`, registered with the catalog.
    pub fn add_movie(&self, title: &str) -> CatalogItem {
        let folder = self.library_root().join(title);
        std::fs::create_dir_all(&folder).expect("create movie folder");
        let content = folder.join(format!("{title}.mkv"));
        std::fs::write(&content, b"not really a video").expect("write movie file");

        let mut item = CatalogItem::new(FsCatalog::item_id(&content), ItemKind::Movie, title, content);
        item.library_root = Some(self.library_root());
        item.group = Some("Movies".into());
        self.catalog.push(item.clone());
        item
    }

    pub fn content_dir(&self, item: &CatalogItem) -> PathBuf {
        item.content_path
            .parent()
            .expect("movie file has a folder")
            .to_path_buf()
    }

    pub fn pool_dir(&self, item: &CatalogItem) -> PathBuf {
        self.content_dir(item).join(".pool")
    }

    /// Offer `count` distinct portrait posters for `item`; returns their URLs.
    pub fn offer(&self, item: &CatalogItem, count: usize) -> Vec<String> {
        (0..count)
            .map(|_| {
                let seed = self.seeds.fetch_add(1, Ordering::SeqCst);
                let url = format!("https://img.test/{}/{seed}.png", item.id);
                self.offer_bytes(item, &url, poster(seed, 40, 60));
                url
            })
            .collect()
    }

    pub fn offer_bytes(&self, item: &CatalogItem, url: &str, bytes: Vec<u8>) {
        self.provider.offer(
            &item.id,
            Candidate::new(PROVIDER_NAME, url, ImageKind::Primary).with_dimensions(400, 600),
        );
        self.fetcher.serve(url, bytes);
    }

    /// Pool member file names, sorted.
    pub fn member_names(&self, item: &CatalogItem) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.pool_dir(item)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| artpool_core::pool::is_member_name(name))
            .collect();
        names.sort();
        names
    }
}
