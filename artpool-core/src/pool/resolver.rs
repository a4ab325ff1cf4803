use std::path::{Path, PathBuf};

use artpool_model::{CatalogItem, PoolConfig};
use tracing::debug;

use super::Pool;

/// Extensions tried, in order, when looking for conventional artwork files.
pub const ARTWORK_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Where an item's pool lives and where its promoted artwork is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolLocation {
    /// Directory holding the item's content (and its artwork).
    pub content_dir: PathBuf,
    pub pool_dir: PathBuf,
    /// The content directory holds more than one item.
    pub mixed_folder: bool,
    /// Artwork file stem: `poster` for exclusive folders,
    /// `<content stem>-poster` for mixed folders.
    pub artwork_stem: String,
}

impl PoolLocation {
    pub fn pool(&self) -> Pool {
        Pool::new(self.pool_dir.clone())
    }

    /// Conventional artwork destination for the given extension.
    pub fn artwork_path(&self, ext: &str) -> PathBuf {
        self.content_dir.join(format!("{}.{ext}", self.artwork_stem))
    }
}

/// Maps items to pool directories.
///
/// The pool is always `<content dir>/<pool_dir_name>`, even when several
/// items share the folder; only the artwork file name is made item-specific
/// so siblings do not overwrite each other.
#[derive(Debug, Clone)]
pub struct PoolResolver {
    pool_dir_name: String,
    video_extensions: Vec<String>,
}

impl PoolResolver {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            pool_dir_name: config.pool_dir_name.clone(),
            video_extensions: config
                .video_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// `None` when the content path does not lead to an existing directory;
    /// callers treat that as a no-op.
    pub async fn resolve(&self, item: &CatalogItem) -> Option<PoolLocation> {
        let content = item.content_path.as_path();
        let meta = match tokio::fs::metadata(content).await {
            Ok(meta) => meta,
            Err(err) => {
                debug!(item = %item.id, path = ?content, error = %err, "content path unavailable");
                return None;
            }
        };

        if meta.is_dir() {
            return Some(self.location(content.to_path_buf(), false, None));
        }

        let parent = content.parent()?;
        let parent_is_dir = tokio::fs::metadata(parent)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !parent_is_dir {
            return None;
        }

        let siblings = self.count_content_files(parent).await;
        let mixed = siblings > 1;
        let stem = content
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string);
        Some(self.location(parent.to_path_buf(), mixed, stem))
    }

    fn location(
        &self,
        content_dir: PathBuf,
        mixed_folder: bool,
        content_stem: Option<String>,
    ) -> PoolLocation {
        let artwork_stem = match (mixed_folder, content_stem) {
            (true, Some(stem)) => format!("{stem}-poster"),
            _ => "poster".to_string(),
        };
        PoolLocation {
            pool_dir: content_dir.join(&self.pool_dir_name),
            content_dir,
            mixed_folder,
            artwork_stem,
        }
    }

    pub fn is_content_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .is_some_and(|ext| self.video_extensions.contains(&ext))
    }

    async fn count_content_files(&self, dir: &Path) -> usize {
        let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
            return 0;
        };
        let mut count = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_file = entry
                .file_type()
                .await
                .map(|ft| ft.is_file())
                .unwrap_or(false);
            if is_file && self.is_content_file(&entry.path()) {
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artpool_model::{ItemId, ItemKind};
    use tempfile::TempDir;

    fn movie(path: PathBuf) -> CatalogItem {
        CatalogItem::new(ItemId::new("m"), ItemKind::Movie, "Movie", path)
    }

    #[tokio::test]
    async fn exclusive_folder_uses_plain_poster_name() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Heat (1995).mkv");
        std::fs::write(&file, b"video").unwrap();
        std::fs::write(dir.path().join("Heat (1995).srt"), b"subs").unwrap();

        let resolver = PoolResolver::new(&PoolConfig::default());
        let loc = resolver.resolve(&movie(file)).await.unwrap();

        assert!(!loc.mixed_folder);
        assert_eq!(loc.pool_dir, dir.path().join(".pool"));
        assert_eq!(loc.artwork_path("jpg"), dir.path().join("poster.jpg"));
    }

    #[tokio::test]
    async fn mixed_folder_keeps_shared_pool_dir_but_unique_artwork() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("Alien (1979).mkv");
        let b = dir.path().join("Aliens (1986).mp4");
        std::fs::write(&a, b"video").unwrap();
        std::fs::write(&b, b"video").unwrap();

        let resolver = PoolResolver::new(&PoolConfig::default());
        let loc_a = resolver.resolve(&movie(a)).await.unwrap();
        let loc_b = resolver.resolve(&movie(b)).await.unwrap();

        assert!(loc_a.mixed_folder);
        assert_eq!(loc_a.pool_dir, loc_b.pool_dir);
        assert_eq!(
            loc_a.artwork_path("jpg"),
            dir.path().join("Alien (1979)-poster.jpg")
        );
        assert_ne!(loc_a.artwork_path("jpg"), loc_b.artwork_path("jpg"));
    }

    #[tokio::test]
    async fn directory_content_resolves_to_itself() {
        let dir = TempDir::new().unwrap();
        let series = dir.path().join("Dark");
        std::fs::create_dir(&series).unwrap();

        let resolver = PoolResolver::new(&PoolConfig::default());
        let loc = resolver.resolve(&movie(series.clone())).await.unwrap();
        assert_eq!(loc.content_dir, series);
        assert_eq!(loc.pool_dir, series.join(".pool"));
    }

    #[tokio::test]
    async fn missing_content_is_unresolved() {
        let dir = TempDir::new().unwrap();
        let resolver = PoolResolver::new(&PoolConfig::default());
        let missing = movie(dir.path().join("nope").join("gone.mkv"));
        assert!(resolver.resolve(&missing).await.is_none());
    }
}
