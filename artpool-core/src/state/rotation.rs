use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use artpool_model::ItemId;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::atomic::{read_json_or_default, write_json_atomic};
use crate::error::Result;

pub const ROTATION_STATE_FILE: &str = "rotation_state.json";

/// Schema version written into `rotation_state.json`. Documents without a
/// `Version` field are version 1.
pub const ROTATION_STATE_VERSION: u32 = 1;

fn current_version() -> u32 {
    ROTATION_STATE_VERSION
}

/// Persisted cursor and last-promotion time for every item.
///
/// Keys are the catalog's stable item ids. Entries that do not parse as
/// integers are dropped on read instead of invalidating the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationStateDoc {
    #[serde(rename = "Version", default = "current_version")]
    pub version: u32,
    #[serde(
        rename = "LastIndexByItem",
        default,
        deserialize_with = "lenient_u64_map"
    )]
    pub last_index_by_item: BTreeMap<String, u64>,
    #[serde(
        rename = "LastRotatedUtcByItem",
        default,
        deserialize_with = "lenient_i64_map"
    )]
    pub last_rotated_utc_by_item: BTreeMap<String, i64>,
}

impl Default for RotationStateDoc {
    fn default() -> Self {
        Self {
            version: ROTATION_STATE_VERSION,
            last_index_by_item: BTreeMap::new(),
            last_rotated_utc_by_item: BTreeMap::new(),
        }
    }
}

/// One item's view of the rotation document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationState {
    pub last_rotated: Option<DateTime<Utc>>,
    /// Next sequential index. `None` until the first sequential promotion.
    pub cursor: Option<u64>,
}

impl RotationStateDoc {
    pub fn get(&self, id: &ItemId) -> RotationState {
        let last_rotated = self
            .last_rotated_utc_by_item
            .get(id.as_str())
            .and_then(|secs| Utc.timestamp_opt(*secs, 0).single());
        RotationState {
            last_rotated,
            cursor: self.last_index_by_item.get(id.as_str()).copied(),
        }
    }

    pub fn set(&mut self, id: &ItemId, state: RotationState) {
        let key = id.as_str().to_string();
        match state.last_rotated {
            Some(at) => {
                self.last_rotated_utc_by_item.insert(key.clone(), at.timestamp());
            }
            None => {
                self.last_rotated_utc_by_item.remove(&key);
            }
        }
        match state.cursor {
            Some(cursor) => {
                self.last_index_by_item.insert(key, cursor);
            }
            None => {
                self.last_index_by_item.remove(&key);
            }
        }
    }
}

/// Reads and writes `rotation_state.json` under the configured state dir.
///
/// The document is re-read before each write so concurrent writers of other
/// items (the management layer) are not clobbered wholesale.
#[derive(Debug, Clone)]
pub struct RotationStateStore {
    path: PathBuf,
}

impl RotationStateStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(ROTATION_STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> RotationStateDoc {
        read_json_or_default(&self.path).await
    }

    pub async fn get(&self, id: &ItemId) -> RotationState {
        self.load().await.get(id)
    }

    /// Read-modify-write of a single item's entry.
    pub async fn update(&self, id: &ItemId, state: RotationState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut doc = self.load().await;
        doc.version = ROTATION_STATE_VERSION;
        doc.set(id, state);
        write_json_atomic(&self.path, &doc).await
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn lenient_u64_map<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?
        .unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| value_as_i64(&value).map(|v| (key, v)))
        .map(|(key, value)| (key, value.max(0) as u64))
        .collect())
}

fn lenient_i64_map<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?
        .unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| value_as_i64(&value).map(|v| (key, v)))
        .collect())
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|v| v.min(i64::MAX as u64) as i64))
            .or_else(|| n.as_f64().map(|v| v as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
