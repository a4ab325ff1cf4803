//! Engine configuration types.
//!
//! These structures are shared between the engine and the binary so they
//! live here; loading from files and the environment happens in
//! `artpool-core::config`.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::image::ImageKind;
use crate::item::ItemKind;
use crate::rotation::RotationPolicy;

pub fn default_video_extensions() -> Vec<String> {
    [
        "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v", "mpg",
        "mpeg", "3gp", "ogv", "ts", "mts", "m2ts",
    ]
    .iter()
    .map(|ext| (*ext).to_string())
    .collect()
}

/// Top-level settings for pool maintenance and rotation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Target number of members per pool.
    pub pool_size: usize,
    /// Minimum hours between top-ups for the same item. Promotion is never
    /// gated by this value.
    pub min_hours_between_switches: f64,
    pub rotation_policy: RotationPolicy,
    /// Create `pool.lock` once a pool reaches `pool_size`; a locked pool is
    /// never topped up again until this is switched off.
    pub lock_after_fill: bool,
    /// Artwork kind that gets promoted.
    pub artwork_kind: ImageKind,
    pub language: LanguageConfig,
    pub quality: QualityConfig,
    /// Maximum Hamming distance (of 64 bits) at which two fingerprints are
    /// treated as the same picture.
    pub duplicate_threshold: u32,
    /// Simultaneous downloads per item.
    pub download_concurrency: usize,
    pub retry: RetryConfig,
    /// Name of the pool subdirectory created beside each item's content.
    pub pool_dir_name: String,
    /// Directory holding `rotation_state.json`.
    pub state_dir: PathBuf,
    pub item_kinds: Vec<ItemKind>,
    pub scope: RunScope,
    /// Libraries enumerated by the filesystem catalog.
    pub libraries: Vec<LibraryConfig>,
    /// Extensions that mark a file as item content when deciding whether a
    /// folder is shared by several items.
    pub video_extensions: Vec<String>,
    pub tmdb: TmdbConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 5,
            min_hours_between_switches: 24.0,
            rotation_policy: RotationPolicy::Sequential,
            lock_after_fill: false,
            artwork_kind: ImageKind::Primary,
            language: LanguageConfig::default(),
            quality: QualityConfig::default(),
            duplicate_threshold: 10,
            download_concurrency: 3,
            retry: RetryConfig::default(),
            pool_dir_name: ".pool".to_string(),
            state_dir: PathBuf::from("./state"),
            item_kinds: vec![ItemKind::Movie, ItemKind::Series],
            scope: RunScope::All,
            libraries: Vec::new(),
            video_extensions: default_video_extensions(),
            tmdb: TmdbConfig::default(),
        }
    }
}

impl PoolConfig {
    pub fn min_interval(&self) -> Duration {
        let secs = (self.min_hours_between_switches.max(0.0) * 3600.0).round();
        Duration::from_secs(secs as u64)
    }
}

/// Language preference and quota settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LanguageConfig {
    pub enabled: bool,
    /// Preferred language tag, compared case-insensitively.
    pub preferred: String,
    /// Cap on preferred-language members in one pool.
    pub max_preferred: usize,
    pub fallback: FallbackLanguage,
    /// Treat untagged candidates as fallback candidates.
    pub include_unknown: bool,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            preferred: "en".to_string(),
            max_preferred: 2,
            fallback: FallbackLanguage::Original,
            include_unknown: true,
        }
    }
}

/// Where the fallback language comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FallbackLanguage {
    /// The item's heuristically detected original language.
    #[default]
    Original,
    /// A fixed language code.
    Static(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QualityConfig {
    /// Minimum width in pixels; 0 disables the check.
    pub min_width: u32,
    /// Minimum height in pixels; 0 disables the check.
    pub min_height: u32,
}

/// Retry/backoff policy for candidate downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_attempts: u16,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Delay before retry number `retry` (1-based): base, 2*base, 4*base...
    pub fn delay_for(&self, retry: u16) -> Duration {
        let exp = u32::from(retry.saturating_sub(1)).min(16);
        let delay = self.backoff_base().saturating_mul(1u32 << exp);
        delay.min(self.backoff_max())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
        }
    }
}

/// Which catalog items a run touches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunScope {
    #[default]
    All,
    /// Only items whose content lives under one of these roots.
    Roots(Vec<PathBuf>),
    /// Only items belonging to one of these named groups (library names).
    Groups(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryConfig {
    pub name: String,
    pub root: PathBuf,
    pub kind: ItemKind,
}

#[derive(Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    /// Language hint sent with search requests.
    pub language: Option<String>,
}

impl fmt::Debug for TmdbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("language", &self.language)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base_and_caps() {
        let retry = RetryConfig {
            max_attempts: 6,
            backoff_base_ms: 1_000,
            backoff_max_ms: 5_000,
        };

        assert_eq!(retry.delay_for(1), Duration::from_secs(1));
        assert_eq!(retry.delay_for(2), Duration::from_secs(2));
        assert_eq!(retry.delay_for(3), Duration::from_secs(4));
        assert_eq!(retry.delay_for(4), Duration::from_secs(5));
    }

    #[test]
    fn min_interval_converts_fractional_hours() {
        let config = PoolConfig {
            min_hours_between_switches: 1.5,
            ..PoolConfig::default()
        };
        assert_eq!(config.min_interval(), Duration::from_secs(5_400));

        let negative = PoolConfig {
            min_hours_between_switches: -3.0,
            ..PoolConfig::default()
        };
        assert_eq!(negative.min_interval(), Duration::ZERO);
    }
}
