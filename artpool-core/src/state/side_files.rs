//! Per-pool JSON side-files.
//!
//! Wire formats are flat so the management UI can read them directly:
//! `pool_languages.json` is `{filename: tag}`, `pool_hashes.json` is
//! `{filename: u64}`, `pool_order.json` is `[filename, ...]`. Readers are
//! lenient about value shapes; anything unusable is dropped per entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::atomic::{read_json_or_default, write_json_atomic};
use crate::error::Result;
use crate::fingerprint::Fingerprint;

pub const LANGUAGES_FILE: &str = "pool_languages.json";
pub const HASHES_FILE: &str = "pool_hashes.json";
pub const ORDER_FILE: &str = "pool_order.json";
pub const LOCK_FILE: &str = "pool.lock";

/// Tag stored for members downloaded without a declared language.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Filename -> language tag for one pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageIndex {
    entries: BTreeMap<String, String>,
}

impl LanguageIndex {
    pub fn get(&self, file_name: &str) -> Option<&str> {
        self.entries.get(file_name).map(String::as_str)
    }

    pub fn insert(&mut self, file_name: impl Into<String>, tag: Option<&str>) {
        let tag = tag
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .unwrap_or(UNKNOWN_LANGUAGE);
        self.entries.insert(file_name.into(), tag.to_ascii_lowercase());
    }

    pub fn remove(&mut self, file_name: &str) -> bool {
        self.entries.remove(file_name).is_some()
    }

    /// Members tagged with `language` (case-insensitive) among `members`.
    pub fn count_language<'a>(
        &self,
        language: &str,
        members: impl IntoIterator<Item = &'a str>,
    ) -> usize {
        members
            .into_iter()
            .filter_map(|name| self.get(name))
            .filter(|tag| tag.eq_ignore_ascii_case(language))
            .count()
    }

    /// Drop entries for files that no longer exist in the pool.
    pub fn retain_members<'a>(
        &mut self,
        members: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        let keep: std::collections::HashSet<&str> = members.into_iter().collect();
        let before = self.entries.len();
        self.entries.retain(|name, _| keep.contains(name.as_str()));
        before != self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for LanguageIndex {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LanguageIndex {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let entries = raw
            .into_iter()
            .filter_map(|(name, value)| match value {
                Value::String(tag) => Some((name, tag)),
                _ => None,
            })
            .collect();
        Ok(Self { entries })
    }
}

/// Filename -> cached perceptual fingerprint for one pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintIndex {
    entries: BTreeMap<String, u64>,
}

impl FingerprintIndex {
    pub fn get(&self, file_name: &str) -> Option<Fingerprint> {
        self.entries.get(file_name).copied().map(Fingerprint::from)
    }

    pub fn insert(&mut self, file_name: impl Into<String>, fp: Fingerprint) {
        self.entries.insert(file_name.into(), fp.bits());
    }

    pub fn remove(&mut self, file_name: &str) -> bool {
        self.entries.remove(file_name).is_some()
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.contains_key(file_name)
    }

    pub fn retain_members<'a>(
        &mut self,
        members: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        let keep: std::collections::HashSet<&str> = members.into_iter().collect();
        let before = self.entries.len();
        self.entries.retain(|name, _| keep.contains(name.as_str()));
        before != self.entries.len()
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = (&str, Fingerprint)> {
        self.entries
            .iter()
            .map(|(name, bits)| (name.as_str(), Fingerprint::from(*bits)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FingerprintIndex {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FingerprintIndex {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let entries = raw
            .into_iter()
            .filter_map(|(name, value)| {
                let bits = match value {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse::<u64>().ok(),
                    _ => None,
                }?;
                Some((name, bits))
            })
            .collect();
        Ok(Self { entries })
    }
}

/// Manually curated member order. Absent unless someone reordered the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolOrder {
    names: Vec<String>,
}

impl PoolOrder {
    pub fn new(names: Vec<String>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let names = names
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, file_name: &str) -> Option<usize> {
        self.names.iter().position(|name| name == file_name)
    }

    pub fn remove(&mut self, file_name: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|name| name != file_name);
        before != self.names.len()
    }
}

impl Serialize for PoolOrder {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        self.names.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PoolOrder {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<Value>::deserialize(deserializer)?;
        let names = raw
            .into_iter()
            .filter_map(|value| match value {
                Value::String(name) => Some(name),
                _ => None,
            })
            .collect();
        Ok(Self::new(names))
    }
}

/// Typed access to the side-files of one pool directory.
#[derive(Debug, Clone)]
pub struct PoolSideFiles {
    dir: PathBuf,
}

impl PoolSideFiles {
    pub fn new(pool_dir: &Path) -> Self {
        Self {
            dir: pool_dir.to_path_buf(),
        }
    }

    pub fn languages_path(&self) -> PathBuf {
        self.dir.join(LANGUAGES_FILE)
    }

    pub fn hashes_path(&self) -> PathBuf {
        self.dir.join(HASHES_FILE)
    }

    pub fn order_path(&self) -> PathBuf {
        self.dir.join(ORDER_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    pub async fn languages(&self) -> LanguageIndex {
        read_json_or_default(&self.languages_path()).await
    }

    pub async fn save_languages(&self, index: &LanguageIndex) -> Result<()> {
        write_json_atomic(&self.languages_path(), index).await
    }

    pub async fn fingerprints(&self) -> FingerprintIndex {
        read_json_or_default(&self.hashes_path()).await
    }

    pub async fn save_fingerprints(&self, index: &FingerprintIndex) -> Result<()> {
        write_json_atomic(&self.hashes_path(), index).await
    }

    pub async fn order(&self) -> PoolOrder {
        read_json_or_default(&self.order_path()).await
    }

    pub async fn save_order(&self, order: &PoolOrder) -> Result<()> {
        write_json_atomic(&self.order_path(), order).await
    }

    pub async fn is_locked(&self) -> bool {
        tokio::fs::try_exists(self.lock_path()).await.unwrap_or(false)
    }

    /// Create the zero-byte lock sentinel.
    pub async fn lock(&self) -> Result<()> {
        tokio::fs::write(self.lock_path(), b"").await?;
        Ok(())
    }

    pub async fn unlock(&self) -> Result<()> {
        match tokio::fs::remove_file(self.lock_path()).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fingerprint_index_accepts_numbers_and_numeric_strings() {
        let raw = r#"{"a.jpg": 18446744073709551615, "b.jpg": "42", "c.jpg": true}"#;
        let index: FingerprintIndex = serde_json::from_str(raw).unwrap();

        assert_eq!(index.get("a.jpg"), Some(Fingerprint::from(u64::MAX)));
        assert_eq!(index.get("b.jpg"), Some(Fingerprint::from(42)));
        assert!(!index.contains("c.jpg"));
    }

    #[test]
    fn language_index_counts_case_insensitively() {
        let mut index = LanguageIndex::default();
        index.insert("a.jpg", Some("FR"));
        index.insert("b.jpg", Some("fr"));
        index.insert("c.jpg", None);
        index.insert("gone.jpg", Some("fr"));

        let members = ["a.jpg", "b.jpg", "c.jpg"];
        assert_eq!(index.count_language("fr", members), 2);
        assert_eq!(index.get("c.jpg"), Some(UNKNOWN_LANGUAGE));
    }

    #[test]
    fn order_drops_non_strings_and_duplicates() {
        let order: PoolOrder =
            serde_json::from_str(r#"["b.jpg", 3, "a.jpg", "b.jpg"]"#).unwrap();
        assert_eq!(order.names().to_vec(), vec!["b.jpg".to_string(), "a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn lock_sentinel_round_trip() {
        let dir = TempDir::new().unwrap();
        let files = PoolSideFiles::new(dir.path());

        assert!(!files.is_locked().await);
        files.lock().await.unwrap();
        assert!(files.is_locked().await);
        assert_eq!(std::fs::metadata(files.lock_path()).unwrap().len(), 0);
        files.unlock().await.unwrap();
        files.unlock().await.unwrap();
        assert!(!files.is_locked().await);
    }
}
