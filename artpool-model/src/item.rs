use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Kinds of catalog items that carry rotatable artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ItemKind {
    Movie,
    Series,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Movie => write!(f, "Movie"),
            ItemKind::Series => write!(f, "Series"),
        }
    }
}

/// Stable identifier the catalog assigns to an item.
///
/// This is the key used in `rotation_state.json`, so it must not change
/// between runs for the same item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of one catalog item as seen by the rotation engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CatalogItem {
    pub id: ItemId,
    pub kind: ItemKind,
    /// Display title.
    pub title: String,
    /// Title in the original release language, when the catalog knows it.
    pub original_title: Option<String>,
    pub year: Option<i32>,
    /// Primary content path: a video file for movies, a folder for series.
    pub content_path: PathBuf,
    /// Library root the item was discovered under.
    pub library_root: Option<PathBuf>,
    /// Named group (library name) used for scope selection.
    pub group: Option<String>,
    /// Cross-reference identifiers keyed by lower-case provider name
    /// (`tmdb`, `imdb`, `anidb`, ...).
    pub provider_ids: BTreeMap<String, String>,
}

impl CatalogItem {
    pub fn new(
        id: ItemId,
        kind: ItemKind,
        title: impl Into<String>,
        content_path: PathBuf,
    ) -> Self {
        Self {
            id,
            kind,
            title: title.into(),
            original_title: None,
            year: None,
            content_path,
            library_root: None,
            group: None,
            provider_ids: BTreeMap::new(),
        }
    }

    pub fn provider_id(&self, provider: &str) -> Option<&str> {
        self.provider_ids
            .get(&provider.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn with_provider_id(
        mut self,
        provider: &str,
        id: impl Into<String>,
    ) -> Self {
        self.provider_ids
            .insert(provider.to_ascii_lowercase(), id.into());
        self
    }
}
