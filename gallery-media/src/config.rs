//! # Gallery configuration
//!
//! Two layers:
//! - [`GatewayConfig`] / [`SweeperConfig`]: typed builder structs with defaults.
//! - [`ConfigStore`]: a plain string key/value store that applications fill
//!   however they like (env, files, flags) and turn into the typed structs.
//!
//! ## Environment overrides
//! ```rust
//! use gallery_media::config::{load_env_config, GatewayConfig};
//!
//! std::env::set_var("GALLERY__INGEST__MAX_FILES", "3");
//! let store = load_env_config("GALLERY__");
//! let config = GatewayConfig::from_snapshot(&store.snapshot());
//! assert_eq!(config.max_files_per_batch, 3);
//! ```
//!
//! Recognized keys:
//! - `ingest.max_file_bytes`, `ingest.max_files`, `ingest.concurrency`
//! - `ingest.allowed_mime_types` (comma separated)
//! - `sweeper.interval_secs`, `sweeper.grace_secs`

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tracing::warn;

/// Image types accepted when nothing else is configured
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] =
    &["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp"];

/// 5MB per file
pub const DEFAULT_MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

/// Files accepted in a single ingest call
pub const DEFAULT_MAX_FILES_PER_BATCH: usize = 10;

#[derive(Debug, Default)]
pub struct ConfigStore {
    values: HashMap<String, String>,
}

impl ConfigStore {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            map: self.values.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    map: HashMap<String, String>,
}

impl ConfigSnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.parsed(key)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.parsed(key)
    }

    /// Comma separated list, trimmed, empty entries dropped
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key = key, value = raw, "ignoring unparsable config value; using default");
                None
            }
        }
    }
}

/// Build a store from environment variables starting with `prefix`.
///
/// `PREFIX__SWEEPER__GRACE_SECS=60` becomes `sweeper.grace_secs = 60`.
pub fn load_env_config(prefix: &str) -> ConfigStore {
    let mut store = ConfigStore::new();
    for (key, value) in std::env::vars() {
        if let Some(stripped) = key.strip_prefix(prefix) {
            let normalized = stripped.to_lowercase().replace("__", ".");
            store.set(normalized, value);
        }
    }
    store
}

/// Policy applied by the media gateway before and during ingest
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Declared types accepted for upload (lowercase)
    pub allowed_mime_types: BTreeSet<String>,

    /// Absolute max size for a single file
    pub max_file_bytes: u64,

    /// Max files in one ingest call; larger batches are rejected whole
    pub max_files_per_batch: usize,

    /// Items of one batch processed at the same time
    pub ingest_concurrency: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_files_per_batch: DEFAULT_MAX_FILES_PER_BATCH,
            ingest_concurrency: 4,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by whatever the snapshot carries
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        let mut config = Self::default();
        if let Some(bytes) = snapshot.get_u64("ingest.max_file_bytes") {
            config = config.with_max_file_bytes(bytes);
        }
        if let Some(files) = snapshot.get_usize("ingest.max_files") {
            config = config.with_max_files_per_batch(files);
        }
        if let Some(concurrency) = snapshot.get_usize("ingest.concurrency") {
            config = config.with_ingest_concurrency(concurrency);
        }
        if let Some(types) = snapshot.get_list("ingest.allowed_mime_types") {
            config = config.with_allowed_mime_types(types);
        }
        config
    }

    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    pub fn with_max_files_per_batch(mut self, files: usize) -> Self {
        self.max_files_per_batch = files;
        self
    }

    /// Clamped to at least 1
    pub fn with_ingest_concurrency(mut self, concurrency: usize) -> Self {
        self.ingest_concurrency = concurrency.max(1);
        self
    }

    /// Replace the allow-list
    pub fn with_allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime_types = types
            .into_iter()
            .map(|t| t.into().trim().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_mime_types
            .contains(&mime_type.trim().to_ascii_lowercase())
    }
}

/// Schedule and safety margins of the reconciliation sweeper
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between scheduled sweeps
    pub interval: Duration,

    /// Minimum age before an unreferenced blob counts as an orphan. Must
    /// exceed the longest plausible gap between a blob write and its insert.
    pub grace_period: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            grace_period: Duration::from_secs(60 * 60),
        }
    }
}

impl SweeperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        let mut config = Self::default();
        if let Some(secs) = snapshot.get_u64("sweeper.interval_secs") {
            config = config.with_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = snapshot.get_u64("sweeper.grace_secs") {
            config = config.with_grace_period(Duration::from_secs(secs));
        }
        config
    }

    /// Clamped to at least one second
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_secs(1));
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}
