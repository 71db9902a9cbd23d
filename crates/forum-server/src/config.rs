//! Server configuration.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (FORUM_*)
//! 2. Config file (`FORUM_CONFIG`, default ./forum.toml)
//! 3. Default values
//!
//! An environment value that does not parse is ignored with a warning and
//! the value from the file (or the default) is kept.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Upper bound for any configured duration (100 years)
const MAX_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address
    pub addr: String,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Session lifetime, fixed at creation
    pub session_ttl_secs: u64,
    /// Lifetime of a new post before its first comment
    pub post_grace_secs: u64,
    /// Expiry push applied by each new comment
    pub comment_grace_secs: u64,
    /// Archival sweep interval
    pub sweep_interval_secs: u64,
    /// Per-request deadline on the API
    pub request_timeout_secs: u64,
    /// Character API root
    pub identity_url: String,
    /// Number of characters available to the identity pool
    pub identity_pool_size: i64,
    /// How often lapsed identity reservations are reclaimed
    pub identity_reclaim_secs: u64,
    /// Image object storage root
    pub storage_url: String,
    /// Length of generated image object codes
    pub storage_code_length: usize,
    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            database_path: PathBuf::from("forum.db"),
            session_ttl_secs: 7 * 24 * 60 * 60,
            post_grace_secs: 600,
            comment_grace_secs: 900,
            sweep_interval_secs: 60,
            request_timeout_secs: 15,
            identity_url: "https://rickandmortyapi.com/api".to_string(),
            identity_pool_size: 826,
            identity_reclaim_secs: 300,
            storage_url: "http://localhost:6969".to_string(),
            storage_code_length: 6,
            secure_cookies: true,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let path = Self::config_path(|key| std::env::var(key).ok());
        Self::load_from(&path, |key| std::env::var(key).ok())
    }

    /// Get the config file path.
    fn config_path(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("FORUM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("forum.toml"))
    }

    fn load_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = env("FORUM_ADDR") {
            self.addr = addr;
        }
        if let Some(path) = env("FORUM_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(url) = env("FORUM_IDENTITY_URL") {
            self.identity_url = url;
        }
        if let Some(url) = env("FORUM_STORAGE_URL") {
            self.storage_url = url;
        }

        override_parsed(&env, "FORUM_SESSION_TTL", &mut self.session_ttl_secs);
        override_parsed(&env, "FORUM_POST_GRACE", &mut self.post_grace_secs);
        override_parsed(&env, "FORUM_COMMENT_GRACE", &mut self.comment_grace_secs);
        override_parsed(&env, "FORUM_SWEEP_INTERVAL", &mut self.sweep_interval_secs);
        override_parsed(&env, "FORUM_REQUEST_TIMEOUT", &mut self.request_timeout_secs);
        override_parsed(&env, "FORUM_IDENTITY_POOL", &mut self.identity_pool_size);
        override_parsed(&env, "FORUM_IDENTITY_RECLAIM", &mut self.identity_reclaim_secs);
        override_parsed(&env, "FORUM_STORAGE_CODE_LENGTH", &mut self.storage_code_length);
        override_parsed(&env, "FORUM_SECURE_COOKIES", &mut self.secure_cookies);
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("session_ttl_secs", self.session_ttl_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("identity_reclaim_secs", self.identity_reclaim_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }
        let durations = [
            ("session_ttl_secs", self.session_ttl_secs),
            ("post_grace_secs", self.post_grace_secs),
            ("comment_grace_secs", self.comment_grace_secs),
        ];
        for (name, value) in durations {
            if value > MAX_SECS {
                anyhow::bail!("{} must be at most {} seconds", name, MAX_SECS);
            }
        }
        if self.identity_pool_size < 1 {
            anyhow::bail!("identity_pool_size must be at least 1");
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        seconds(self.session_ttl_secs)
    }

    pub fn post_grace(&self) -> chrono::Duration {
        seconds(self.post_grace_secs)
    }

    pub fn comment_grace(&self) -> chrono::Duration {
        seconds(self.comment_grace_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn identity_reclaim_interval(&self) -> Duration {
        Duration::from_secs(self.identity_reclaim_secs)
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_SECS) as i64)
}

fn override_parsed<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    let Some(raw) = env(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => warn!(key, value = %raw, "Ignoring unparsable config value"),
    }
}
