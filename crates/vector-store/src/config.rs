use crate::cache::EvictionPolicy;
use crate::error::{Result, VectorStoreError};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_VECTORS: usize = 10_000;
pub const DEFAULT_CACHE_SIZE: usize = 1_000;
pub const DEFAULT_CANCEL_CHECK_INTERVAL: usize = 100;

const MAX_CACHE_SIZE: usize = 1_000_000;
const MAX_AUTOSAVE_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub max_vectors: usize,
    pub normalize_vectors: bool,
    pub enable_cache: bool,
    pub cache_size: usize,
    pub eviction_policy: EvictionPolicy,
    /// Number of comparisons between cancellation checks in `search_with_cancel`.
    pub cancel_check_interval: usize,
    pub persist_path: Option<PathBuf>,
    pub autosave_interval: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_vectors: DEFAULT_MAX_VECTORS,
            normalize_vectors: false,
            enable_cache: true,
            cache_size: DEFAULT_CACHE_SIZE,
            eviction_policy: EvictionPolicy::Fifo,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
            persist_path: None,
            autosave_interval: None,
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by `LOGLENS_*` environment variables.
    ///
    /// Unparseable values fall back to the default instead of failing.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_vectors = parse_usize(
            env("LOGLENS_MAX_VECTORS").as_deref(),
            defaults.max_vectors,
            1,
            usize::MAX,
        );
        let cache_size = parse_usize(
            env("LOGLENS_CACHE_SIZE").as_deref(),
            defaults.cache_size,
            1,
            MAX_CACHE_SIZE,
        );
        let eviction_policy = env("LOGLENS_CACHE_POLICY")
            .and_then(|raw| EvictionPolicy::parse(&raw))
            .unwrap_or(defaults.eviction_policy);
        let normalize_vectors = env("LOGLENS_NORMALIZE")
            .map(|raw| parse_bool(&raw))
            .unwrap_or(defaults.normalize_vectors);
        let persist_path = env("LOGLENS_STORE_PATH").map(PathBuf::from);
        let autosave_interval = env("LOGLENS_AUTOSAVE_SECS")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs.min(MAX_AUTOSAVE_SECS)));

        Self {
            max_vectors,
            normalize_vectors,
            cache_size,
            eviction_policy,
            persist_path,
            autosave_interval,
            ..defaults
        }
    }

    #[must_use]
    pub const fn with_max_vectors(mut self, max_vectors: usize) -> Self {
        self.max_vectors = max_vectors;
        self
    }

    #[must_use]
    pub const fn with_normalization(mut self, normalize: bool) -> Self {
        self.normalize_vectors = normalize;
        self
    }

    #[must_use]
    pub const fn with_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    #[must_use]
    pub const fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    #[must_use]
    pub const fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    #[must_use]
    pub const fn with_cancel_check_interval(mut self, interval: usize) -> Self {
        self.cancel_check_interval = interval;
        self
    }

    #[must_use]
    pub fn with_persist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_path = Some(path.into());
        self
    }

    #[must_use]
    pub const fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = Some(interval);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_vectors == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "max_vectors must be greater than zero".to_string(),
            ));
        }
        if self.enable_cache && self.cache_size == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "cache_size must be greater than zero when the cache is enabled".to_string(),
            ));
        }
        if self.cancel_check_interval == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "cancel_check_interval must be greater than zero".to_string(),
            ));
        }
        if matches!(self.autosave_interval, Some(d) if d.is_zero()) {
            return Err(VectorStoreError::InvalidConfig(
                "autosave_interval must be non-zero".to_string(),
            ));
        }
        if self.autosave_interval.is_some() && self.persist_path.is_none() {
            return Err(VectorStoreError::InvalidConfig(
                "autosave_interval requires persist_path".to_string(),
            ));
        }
        Ok(())
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_usize(raw: Option<&str>, default_value: usize, min: usize, max: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(min, max)
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
