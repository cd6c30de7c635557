//! Engine configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for an override (`RIVAL_CONFIG`, else ~/.local/share/rival/config/engine.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their default value.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::Deserialize;

use crate::curate::MAX_COMPETITORS;
use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "RIVAL_CONFIG";

/// How long a search may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Instant UI feedback for a single charge
    Quick,
    /// Full competitor search
    Full,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Full => "full",
        }
    }
}

/// Suggestion cache settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: ChronoDuration,
    pub max_competitors: usize,
}

/// Collaborator call settings
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub quick_timeout: Duration,
    pub full_timeout: Duration,
    pub temperature: f32,
}

impl SearchConfig {
    /// Deadline for a search in the given mode
    pub fn timeout(&self, mode: SearchMode) -> Duration {
        match mode {
            SearchMode::Quick => self.quick_timeout,
            SearchMode::Full => self.full_timeout,
        }
    }
}

/// Background sweep settings
#[derive(Debug, Clone)]
pub struct JanitorConfig {
    pub interval: Duration,
    pub sweep_timeout: Duration,
}

/// Complete engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub search: SearchConfig,
    /// Charges analyzed concurrently by the bulk analyzer
    pub bulk_concurrency: usize,
    pub janitor: JanitorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig {
                ttl: ChronoDuration::days(30),
                max_competitors: MAX_COMPETITORS,
            },
            search: SearchConfig {
                quick_timeout: Duration::from_secs(8),
                full_timeout: Duration::from_secs(60),
                temperature: 0.2,
            },
            bulk_concurrency: 4,
            janitor: JanitorConfig {
                interval: Duration::from_secs(24 * 3600),
                sweep_timeout: Duration::from_secs(10),
            },
        }
    }
}

impl EngineConfig {
    /// Load configuration (override first, then embedded default)
    pub fn load() -> Result<Self> {
        let override_path = std::env::var(CONFIG_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path);
        load_config(override_path.as_ref())
    }

    /// Load from an explicit path, falling back to defaults if it does not exist
    pub fn with_config_path(path: PathBuf) -> Result<Self> {
        load_config(Some(&path))
    }

    /// Parse configuration from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("rival").join("config").join("engine.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&PathBuf>) -> Result<EngineConfig> {
    let content = match override_path {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "Loading engine config override");
            fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?
        }
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    cache: Option<RawCache>,
    search: Option<RawSearch>,
    bulk: Option<RawBulk>,
    janitor: Option<RawJanitor>,
}

#[derive(Debug, Deserialize)]
struct RawCache {
    ttl_days: Option<i64>,
    max_competitors: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawSearch {
    quick_timeout_secs: Option<u64>,
    full_timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawBulk {
    concurrency: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawJanitor {
    interval_hours: Option<u64>,
    sweep_timeout_secs: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<EngineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = EngineConfig::default();

    if let Some(cache) = raw.cache {
        if let Some(days) = cache.ttl_days {
            if days <= 0 {
                return Err(Error::Config(format!(
                    "cache.ttl_days must be positive, got {}",
                    days
                )));
            }
            config.cache.ttl = ChronoDuration::days(days);
        }
        if let Some(max) = cache.max_competitors {
            config.cache.max_competitors = max.clamp(1, MAX_COMPETITORS);
        }
    }

    if let Some(search) = raw.search {
        if let Some(secs) = search.quick_timeout_secs {
            config.search.quick_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = search.full_timeout_secs {
            config.search.full_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(temperature) = search.temperature {
            config.search.temperature = temperature;
        }
    }

    if let Some(bulk) = raw.bulk {
        if let Some(concurrency) = bulk.concurrency {
            config.bulk_concurrency = concurrency.max(1);
        }
    }

    if let Some(janitor) = raw.janitor {
        if let Some(hours) = janitor.interval_hours {
            config.janitor.interval = Duration::from_secs(hours.max(1) * 3600);
        }
        if let Some(secs) = janitor.sweep_timeout_secs {
            config.janitor.sweep_timeout = Duration::from_secs(secs.max(1));
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.cache.ttl, ChronoDuration::days(30));
        assert_eq!(config.cache.max_competitors, 3);
        assert_eq!(config.search.timeout(SearchMode::Quick), Duration::from_secs(8));
        assert_eq!(config.search.timeout(SearchMode::Full), Duration::from_secs(60));
        assert_eq!(config.janitor.interval, Duration::from_secs(86_400));
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
            [cache]
            ttl_days = 7

            [bulk]
            concurrency = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.ttl, ChronoDuration::days(7));
        assert_eq!(config.bulk_concurrency, 1);
        assert_eq!(config.search.quick_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_max_competitors_is_capped() {
        let config = parse_config("[cache]\nmax_competitors = 10\n").unwrap();
        assert_eq!(config.cache.max_competitors, MAX_COMPETITORS);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            parse_config("[cache]\nttl_days = 0\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(parse_config("not = [toml"), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_override_falls_back() {
        let config =
            EngineConfig::with_config_path(PathBuf::from("/nonexistent/rival/engine.toml")).unwrap();
        assert_eq!(config.cache.ttl, ChronoDuration::days(30));
    }
}
