//! Filesystem-backed catalog: items are discovered by walking library roots.

use std::path::{Path, PathBuf};

use artpool_model::{CatalogItem, ItemId, ItemKind, LibraryConfig, PoolConfig};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::{DirEntry, WalkDir};

use super::{CatalogCapabilities, CatalogError, CollaboratorError, MediaCatalog};
use crate::pool::{ARTWORK_EXTENSIONS, PoolResolver};

static TITLE_YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s*\((\d{4})\)").expect("title year regex should compile")
});
static PROVIDER_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\[\{]\s*(tmdbid|tmdb|imdbid|imdb|tvdbid|tvdb|anidbid|anidb|anilistid|anilist)\s*[-=]\s*([^\]\}\s]+)\s*[\]\}]")
        .expect("provider id regex should compile")
});
static NFO_UNIQUE_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<uniqueid\b[^>]*\btype\s*=\s*"([^"]+)"[^>]*>\s*([^<]+?)\s*</uniqueid>"#)
        .expect("nfo uniqueid regex should compile")
});
static NFO_FIELD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(title|originaltitle|year)>\s*(.*?)\s*</(title|originaltitle|year)>")
        .expect("nfo field regex should compile")
});
static COLLAPSE_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Catalog over plain library folders.
///
/// Movies are one item per video file; series are one item per top-level
/// folder. Ids are UUIDv5 of the content path so they survive restarts.
#[derive(Debug, Clone)]
pub struct FsCatalog {
    libraries: Vec<LibraryConfig>,
    resolver: PoolResolver,
    pool_dir_name: String,
}

impl FsCatalog {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            libraries: config.libraries.clone(),
            resolver: PoolResolver::new(config),
            pool_dir_name: config.pool_dir_name.clone(),
        }
    }

    pub fn item_id(content_path: &Path) -> ItemId {
        let uuid = Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            content_path.to_string_lossy().as_bytes(),
        );
        ItemId::new(uuid.to_string())
    }

    fn is_skipped_dir(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        entry.depth() > 0
            && entry.file_type().is_dir()
            && (name.starts_with('.') || name == self.pool_dir_name)
    }

    fn walk_movies(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| !self.is_skipped_dir(entry));
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.resolver.is_content_file(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => warn!("Error walking directory: {}", e),
            }
        }
        files
    }

    fn walk_series(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| !self.is_skipped_dir(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Error walking directory: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .map(DirEntry::into_path)
            .collect()
    }

    async fn build_item(&self, library: &LibraryConfig, content_path: PathBuf) -> CatalogItem {
        let name = match library.kind {
            ItemKind::Movie => {
                let stem = file_stem(&content_path);
                // Scene-style file names often lack the year the folder has.
                let folder = content_path
                    .parent()
                    .filter(|parent| *parent != library.root.as_path())
                    .map(file_name);
                match folder {
                    Some(folder) if parse_title(&stem).1.is_none() && parse_title(&folder).1.is_some() => {
                        folder
                    }
                    _ => stem,
                }
            }
            ItemKind::Series => file_name(&content_path),
        };

        let (title, year) = parse_title(&name);
        let mut item = CatalogItem::new(
            Self::item_id(&content_path),
            library.kind,
            title,
            content_path.clone(),
        );
        item.year = year;
        item.library_root = Some(library.root.clone());
        item.group = Some(library.name.clone());
        for (provider, id) in parse_provider_ids(&name) {
            item.provider_ids.insert(provider, id);
        }

        if let Some(nfo) = read_nfo(library.kind, &content_path).await {
            nfo.apply(&mut item);
        }
        item
    }
}

#[async_trait]
impl MediaCatalog for FsCatalog {
    async fn eligible_items(&self, kinds: &[ItemKind]) -> Result<Vec<CatalogItem>, CatalogError> {
        let libraries: Vec<LibraryConfig> = self
            .libraries
            .iter()
            .filter(|library| kinds.contains(&library.kind))
            .cloned()
            .collect();

        let mut items = Vec::new();
        let mut unavailable = Vec::new();
        for library in &libraries {
            let is_dir = tokio::fs::metadata(&library.root)
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false);
            if !is_dir {
                warn!(library = %library.name, root = ?library.root, "library root unavailable");
                unavailable.push(library.root.clone());
                continue;
            }

            let walker = self.clone();
            let root = library.root.clone();
            let kind = library.kind;
            let paths = tokio::task::spawn_blocking(move || match kind {
                ItemKind::Movie => walker.walk_movies(&root),
                ItemKind::Series => walker.walk_series(&root),
            })
            .await
            .map_err(|e| CatalogError::Other(format!("library walk panicked: {e}")))?;

            debug!(library = %library.name, found = paths.len(), "walked library");
            for path in paths {
                items.push(self.build_item(library, path).await);
            }
        }

        if !libraries.is_empty() && unavailable.len() == libraries.len() {
            return Err(CatalogError::RootUnavailable(unavailable.remove(0)));
        }

        items.sort_by(|a, b| a.content_path.cmp(&b.content_path));
        info!("Catalog enumerated {} items from {} libraries", items.len(), libraries.len());
        Ok(items)
    }

    fn capabilities(&self) -> CatalogCapabilities {
        CatalogCapabilities::default()
    }

    async fn current_artwork(&self, item: &CatalogItem) -> Result<Option<PathBuf>, CollaboratorError> {
        let Some(location) = self.resolver.resolve(item).await else {
            return Ok(None);
        };

        let mut stems = vec![location.artwork_stem.clone()];
        if !location.mixed_folder {
            stems.push("folder".to_string());
        }
        for stem in stems {
            for ext in ARTWORK_EXTENSIONS {
                let path = location.content_dir.join(format!("{stem}.{ext}"));
                let usable = tokio::fs::metadata(&path)
                    .await
                    .map(|meta| meta.is_file() && meta.len() > 0)
                    .unwrap_or(false);
                if usable {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }

    async fn set_artwork(&self, _item: &CatalogItem, _path: &Path) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Unsupported)
    }

    async fn notify_artwork_changed(&self, _item: &CatalogItem) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Unsupported)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `Title (Year) [tmdbid-1]` -> (`Title`, Some(Year)).
pub fn parse_title(name: &str) -> (String, Option<i32>) {
    let stripped = PROVIDER_ID_PATTERN.replace_all(name, " ");
    let stripped = COLLAPSE_WHITESPACE.replace_all(stripped.trim(), " ");

    if let Some(caps) = TITLE_YEAR_PATTERN.captures(&stripped) {
        let title = caps[1].trim().to_string();
        let year = caps[2].parse().ok();
        if !title.is_empty() {
            return (title, year);
        }
    }
    (stripped.trim().to_string(), None)
}

/// Cross-reference ids embedded in a file or folder name.
pub fn parse_provider_ids(name: &str) -> Vec<(String, String)> {
    PROVIDER_ID_PATTERN
        .captures_iter(name)
        .map(|caps| {
            let key = caps[1].to_ascii_lowercase();
            let key = key.strip_suffix("id").unwrap_or(&key).to_string();
            (key, caps[2].to_string())
        })
        .collect()
}

#[derive(Debug, Default, PartialEq)]
struct NfoFields {
    title: Option<String>,
    original_title: Option<String>,
    year: Option<i32>,
    ids: Vec<(String, String)>,
}

impl NfoFields {
    fn parse(xml: &str) -> Self {
        Self {
            title: nfo_tag(xml, "title"),
            original_title: nfo_tag(xml, "originaltitle"),
            year: nfo_tag(xml, "year").and_then(|year| year.parse().ok()),
            ids: NFO_UNIQUE_ID_PATTERN
                .captures_iter(xml)
                .map(|caps| (caps[1].trim().to_ascii_lowercase(), unescape_xml(&caps[2])))
                .filter(|(_, id)| !id.is_empty())
                .collect(),
        }
    }

    fn apply(self, item: &mut CatalogItem) {
        if let Some(title) = self.title {
            item.title = title;
        }
        if self.original_title.is_some() {
            item.original_title = self.original_title;
        }
        if self.year.is_some() {
            item.year = self.year;
        }
        for (provider, id) in self.ids {
            item.provider_ids.insert(provider, id);
        }
    }
}

/// First non-empty `<tag>` among the fields `NFO_FIELD_PATTERN` knows.
fn nfo_tag(xml: &str, tag: &str) -> Option<String> {
    NFO_FIELD_PATTERN
        .captures_iter(xml)
        .filter(|caps| caps[1].eq_ignore_ascii_case(tag) && caps[3].eq_ignore_ascii_case(tag))
        .map(|caps| unescape_xml(&caps[2]))
        .find(|value| !value.is_empty())
}

fn unescape_xml(raw: &str) -> String {
    raw.trim()
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

async fn read_nfo(kind: ItemKind, content_path: &Path) -> Option<NfoFields> {
    let candidates = match kind {
        ItemKind::Movie => {
            let parent = content_path.parent()?;
            vec![content_path.with_extension("nfo"), parent.join("movie.nfo")]
        }
        ItemKind::Series => vec![content_path.join("tvshow.nfo")],
    };
    for path in candidates {
        if let Ok(xml) = tokio::fs::read_to_string(&path).await {
            debug!(nfo = ?path, "reading nfo sidecar");
            return Some(NfoFields::parse(&xml));
        }
    }
    None
}
