//! Loading [`PoolConfig`] from files and the environment.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use artpool_model::PoolConfig;
use tracing::warn;

pub const CONFIG_PATH_ENV: &str = "ARTPOOL_CONFIG_PATH";
pub const CONFIG_JSON_ENV: &str = "ARTPOOL_CONFIG_JSON";
pub const TMDB_API_KEY_ENV: &str = "TMDB_API_KEY";
pub const TMDB_LANG_ENV: &str = "TMDB_LANG";

/// Source that produced the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Load configuration overrides.
/// Evaluation order:
/// 1) `$ARTPOOL_CONFIG_PATH` (TOML or JSON file),
/// 2) `$ARTPOOL_CONFIG_JSON` (inline JSON),
/// 3) the first of `artpool.toml`, `artpool.json`, `config/artpool.toml`,
/// 4) defaults.
///
/// The result is validated and TMDB settings fall back to the environment.
pub fn load_from_env() -> anyhow::Result<(PoolConfig, ConfigSource)> {
    let (config, source) = discover()?;
    Ok((finalize(config), source))
}

fn discover() -> anyhow::Result<(PoolConfig, ConfigSource)> {
    if let Ok(path_str) = env::var(CONFIG_PATH_ENV)
        && !path_str.trim().is_empty()
    {
        let path = PathBuf::from(path_str);
        let config = load_from_file(&path)?;
        return Ok((config, ConfigSource::EnvPath(path)));
    }

    if let Ok(raw) = env::var(CONFIG_JSON_ENV)
        && !raw.trim().is_empty()
    {
        let parsed = parse_json(&raw).with_context(|| format!("failed to parse {CONFIG_JSON_ENV}"))?;
        return Ok((parsed, ConfigSource::EnvInline));
    }

    if let Some(path) = find_default_file() {
        let config = load_from_file(&path)?;
        return Ok((config, ConfigSource::File(path)));
    }

    Ok((PoolConfig::default(), ConfigSource::Default))
}

/// Load an explicit file (the CLI's `--config`), validated.
pub fn load_path(path: &Path) -> anyhow::Result<(PoolConfig, ConfigSource)> {
    let config = load_from_file(path)?;
    Ok((finalize(config), ConfigSource::File(path.to_path_buf())))
}

pub fn load_from_file(path: &Path) -> anyhow::Result<PoolConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read artpool config from {}", path.display()))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => parse_json(&contents).with_context(|| format!("invalid artpool config {}", path.display())),
        Some("toml") | Some("tml") => toml::from_str(&contents)
            .map_err(|err| anyhow!("invalid artpool config {}: {}", path.display(), err)),
        _ => parse_from_str(&contents, &path.display().to_string()),
    }
}

pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<PoolConfig> {
    // Try TOML first, then JSON for convenience.
    toml::from_str(contents).or_else(|toml_err| {
        serde_json::from_str(contents).map_err(|json_err| {
            anyhow!(
                "failed to parse artpool config {}: toml error: {}; json error: {}",
                origin,
                toml_err,
                json_err
            )
        })
    })
}

pub fn parse_json(raw: &str) -> anyhow::Result<PoolConfig> {
    serde_json::from_str(raw).map_err(|err| anyhow!("invalid artpool config json: {err}"))
}

fn find_default_file() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &["artpool.toml", "artpool.json", "config/artpool.toml"];

    CANDIDATES
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(|path| path.to_path_buf())
}

fn finalize(config: PoolConfig) -> PoolConfig {
    let mut config = validate(config);
    if config.tmdb.api_key.is_none() {
        config.tmdb.api_key = env::var(TMDB_API_KEY_ENV).ok().filter(|key| !key.trim().is_empty());
    }
    if config.tmdb.language.is_none() {
        config.tmdb.language = env::var(TMDB_LANG_ENV).ok().filter(|lang| !lang.trim().is_empty());
    }
    config
}

/// Clamp values that would stall the engine.
pub fn validate(mut config: PoolConfig) -> PoolConfig {
    if config.pool_size == 0 {
        warn!("pool_size 0 is not usable; using 1");
        config.pool_size = 1;
    }
    if config.download_concurrency == 0 {
        warn!("download_concurrency 0 is not usable; using 1");
        config.download_concurrency = 1;
    }
    if !config.min_hours_between_switches.is_finite() || config.min_hours_between_switches < 0.0 {
        warn!(
            value = config.min_hours_between_switches,
            "min_hours_between_switches must be a non-negative number; using 0"
        );
        config.min_hours_between_switches = 0.0;
    }
    if config.duplicate_threshold > 64 {
        config.duplicate_threshold = 64;
    }
    if config.pool_dir_name.trim().is_empty() || config.pool_dir_name.contains(['/', '\\']) {
        warn!(value = %config.pool_dir_name, "invalid pool_dir_name; using .pool");
        config.pool_dir_name = ".pool".to_string();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use artpool_model::{FallbackLanguage, ItemKind, RotationPolicy, RunScope};
    use tempfile::TempDir;

    #[test]
    fn toml_overrides_keep_defaults_for_missing_fields() {
        let raw = r#"
            pool_size = 8
            rotation_policy = "random"
            lock_after_fill = true

            [language]
            enabled = true
            preferred = "fr"
            fallback = { static = "de" }

            [scope]
            groups = ["Anime"]

            [[libraries]]
            name = "Movies"
            root = "/media/movies"
            kind = "movie"
        "#;
        let config = parse_from_str(raw, "inline").unwrap();

        assert_eq!(config.pool_size, 8);
        assert_eq!(config.rotation_policy, RotationPolicy::Random);
        assert!(config.lock_after_fill);
        assert_eq!(config.language.fallback, FallbackLanguage::Static("de".into()));
        assert_eq!(config.language.max_preferred, 2);
        assert_eq!(config.scope, RunScope::Groups(vec!["Anime".into()]));
        assert_eq!(config.libraries[0].kind, ItemKind::Movie);
        assert_eq!(config.duplicate_threshold, 10);
    }

    #[test]
    fn json_files_are_detected_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artpool.json");
        fs::write(&path, r#"{"pool_size": 3, "retry": {"max_attempts": 1}}"#).unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.retry.backoff_base_ms, 1_000);
    }

    #[test]
    fn validate_clamps_unusable_values() {
        let config = validate(PoolConfig {
            pool_size: 0,
            download_concurrency: 0,
            min_hours_between_switches: f64::NAN,
            duplicate_threshold: 200,
            pool_dir_name: "a/b".into(),
            ..PoolConfig::default()
        });
        assert_eq!(config.pool_size, 1);
        assert_eq!(config.download_concurrency, 1);
        assert_eq!(config.min_hours_between_switches, 0.0);
        assert_eq!(config.duplicate_threshold, 64);
        assert_eq!(config.pool_dir_name, ".pool");
    }

    #[test]
    fn garbage_reports_both_parsers() {
        let err = parse_from_str("{{ nope", "test").unwrap_err().to_string();
        assert!(err.contains("toml error"));
        assert!(err.contains("json error"));
    }
}
