//! Client config load/save for `~/.rag-chat/config.yaml`, and resolution of
//! the answering service's base address.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Base address used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Runtime override for the base address.
pub const BASE_URL_ENV: &str = "RAG_BASE_URL";

/// Base address baked in at build time, if `RAG_BASE_URL` was set then.
pub const BUILD_BASE_URL: Option<&str> = option_env!("RAG_BASE_URL");

pub const DEFAULT_HEALTH_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_TOP_K: u32 = 6;

/// API section (base_url).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ApiSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Health section (poll interval).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct HealthSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
}

/// Chat section (result count sent with each query).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ChatSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

/// Full config file.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub health: HealthSection,
    #[serde(default)]
    pub chat: ChatSection,
}

impl Config {
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(
            self.health
                .interval_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_HEALTH_INTERVAL_MS),
        )
    }

    pub fn top_k(&self) -> u32 {
        self.chat.top_k.unwrap_or(DEFAULT_TOP_K)
    }
}

/// Returns the default config file path: `~/.rag-chat/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".rag-chat").join("config.yaml"))
}

/// Load config from a YAML file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}

/// Like [`load`], but a missing file yields the default config.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    load(path)
}

/// Save config to a YAML file. Creates parent directory if missing.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Config load/save error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Base address of the answering service. Resolved once, never mutated;
/// clones share the same string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    pub fn new(base: &str) -> Self {
        Endpoint(Arc::from(base.trim().trim_end_matches('/')))
    }

    /// Pick the first non-blank candidate, in order: explicit value, runtime
    /// environment, config file, build-time value, then the default.
    pub fn resolve(
        explicit: Option<&str>,
        runtime: Option<&str>,
        config: Option<&str>,
        build_time: Option<&str>,
    ) -> Self {
        let chosen = [explicit, runtime, config, build_time]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        let endpoint = Endpoint::new(chosen);
        tracing::info!(base = %endpoint, "resolved answering service endpoint");
        endpoint
    }

    /// Resolve from the process environment, a loaded config and an optional
    /// command-line value.
    pub fn from_env(explicit: Option<&str>, config: &Config) -> Self {
        let runtime = std::env::var(BASE_URL_ENV).ok();
        Self::resolve(
            explicit,
            runtime.as_deref(),
            config.api.base_url.as_deref(),
            BUILD_BASE_URL,
        )
    }

    pub fn base(&self) -> &str {
        &self.0
    }

    pub fn healthz_url(&self) -> String {
        format!("{}/healthz", self.0)
    }

    pub fn answer_url(&self) -> String {
        format!("{}/answer", self.0)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
