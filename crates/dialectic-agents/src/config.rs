//! Layered configuration for the `dialectic` binary.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (applied by `main`)
//! 2. Environment variables (`DIALECTIC_BASE_URL`, ...)
//! 3. The TOML file passed with `--config`
//! 4. Built-in defaults (local OpenAI-compatible server on :8080)

use std::path::Path;

use anyhow::{bail, Context, Result};
use dialectic::{DialecticConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Default local inference base URL.
const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1";
/// Default model alias.
const DEFAULT_MODEL: &str = "Qwen2.5-72B-Instruct";
/// Placeholder key; local servers ignore it.
const DEFAULT_API_KEY: &str = "local";
/// Per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub const ENV_BASE_URL: &str = "DIALECTIC_BASE_URL";
pub const ENV_API_KEY: &str = "DIALECTIC_API_KEY";
pub const ENV_MODEL: &str = "DIALECTIC_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "DIALECTIC_TIMEOUT_SECS";

/// OpenAI-compatible inference endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL including the `/v1` suffix.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Top-level configuration for the binary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub endpoint: EndpointConfig,
    /// Applied to every generation by wrapping the port.
    pub retry: RetryPolicy,
    pub dialectic: DialecticConfig,
}

impl AgentsConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply overrides from `lookup` (the process environment in `load`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.endpoint.base_url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.endpoint.api_key = key;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.endpoint.model = model;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.endpoint.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT_SECS} must be an integer, got {secs:?}"))?;
        }
        Ok(())
    }

    /// Validate the endpoint and the core configuration.
    pub fn validate(&self) -> Result<()> {
        let endpoint = &self.endpoint;
        if !(endpoint.base_url.starts_with("http://") || endpoint.base_url.starts_with("https://")) {
            bail!(
                "endpoint.base_url must be an http(s) URL, got {:?}",
                endpoint.base_url
            );
        }
        if endpoint.model.trim().is_empty() {
            bail!("endpoint.model must not be empty");
        }
        if endpoint.timeout_secs == 0 {
            bail!("endpoint.timeout_secs must be > 0");
        }
        self.dialectic.validate()?;
        Ok(())
    }
}
