// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! TOML configuration.
//!
//! ```toml
//! [backend]
//! base_url = "https://portal.example.com/api"
//! endpoint = "/audit/events"
//! auth_token = ""
//! timeout_secs = 30
//!
//! [feed]
//! days = 7
//! page_size = 50
//! max_pages = 10
//!
//! [feed.flags]
//! includeSystem = "true"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field has a default, so an empty file is valid. The auth token can
//! also come from `AUDITFEED_TOKEN`, which wins over the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::source::PageQuery;

/// Environment variable that overrides `backend.auth_token`.
pub const TOKEN_ENV: &str = "AUDITFEED_TOKEN";

/// Default search order when no explicit path is given.
pub const DEFAULT_PATHS: [&str; 2] = ["/etc/auditfeed/config.toml", "./config.toml"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the audit query endpoint lives and how to reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token; empty means no `Authorization` header.
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { "http://localhost:8080/api".to_string() }
fn default_endpoint() -> String { "/audit/events".to_string() }
fn default_timeout_secs() -> u64 { 30 }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoint: default_endpoint(),
            auth_token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Initial server-side query parameters and paging limits.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Upper bound on pages the CLI loads in one run.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default)]
    pub flags: BTreeMap<String, String>,
}

fn default_days() -> u32 { 7 }
fn default_page_size() -> u32 { 50 }
fn default_max_pages() -> u32 { 10 }

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            flags: BTreeMap::new(),
        }
    }
}

impl FeedConfig {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            days: self.days,
            page_size: self.page_size,
            flags: self.flags.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

impl Config {
    /// Parse a config file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else the first existing file in [`DEFAULT_PATHS`],
    /// else built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        for candidate in DEFAULT_PATHS.iter().map(PathBuf::from) {
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }
        let mut config = Config::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                self.backend.auth_token = token;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.feed.page_size == 0 {
            anyhow::bail!("feed.page_size must be at least 1");
        }
        if self.feed.days == 0 {
            anyhow::bail!("feed.days must be at least 1");
        }
        if self.backend.timeout_secs == 0 {
            anyhow::bail!("backend.timeout_secs must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.backend.endpoint, "/audit/events");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.feed.page_size, 50);
        assert_eq!(config.feed.days, 7);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_file() {
        let file = write_config(
            r#"
[backend]
base_url = "https://portal.example.com/api"
endpoint = "/v2/audit"
timeout_secs = 10

[feed]
days = 30
page_size = 25
max_pages = 3

[feed.flags]
includeSystem = "true"

[logging]
level = "debug"
"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "https://portal.example.com/api");
        assert_eq!(config.backend.timeout_secs, 10);
        assert_eq!(config.feed.max_pages, 3);

        let query = config.feed.page_query();
        assert_eq!(query.days, 30);
        assert_eq!(query.page_size, 25);
        assert_eq!(query.flags.get("includeSystem").map(String::as_str), Some("true"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let file = write_config("[feed]\npage_size = 0\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let file = write_config("[backend\nbase_url = ");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let missing = Path::new("/definitely/not/here/auditfeed.toml");
        assert!(Config::discover(Some(missing)).is_err());
    }
}
