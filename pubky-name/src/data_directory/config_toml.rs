//! Configuration file of pubky-name.
//!
//! All default values live exclusively in `config.default.toml`.
//! This module embeds that file at compile-time and lets callers layer
//! their own TOML on top of it.

use std::{
    fmt::Debug,
    fs,
    num::{NonZeroU64, NonZeroU8},
    path::Path,
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    log_level::{LogLevel, TargetLevel},
    toml_merge::Merger,
};
use crate::namesys::RetrySettings;

/// Embedded copy of the default configuration (single source of truth for defaults)
pub const DEFAULT_CONFIG: &str = include_str!("config.default.toml");

/// Example configuration file
pub const SAMPLE_CONFIG: &str = include_str!("../../config.sample.toml");

/// Error that can occur when reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigReadError {
    /// The file did not exist or could not be read.
    #[error("config file not found: {0}")]
    ConfigFileNotFound(#[from] std::io::Error),
    /// The TOML was syntactically invalid.
    #[error("config file is not valid TOML: {0}")]
    ConfigFileNotValid(#[from] toml::de::Error),
    /// Failed to merge defaults with overrides.
    #[error("failed to merge embedded and user TOML: {0}")]
    ConfigMergeError(String),
}

/// Defaults of the `publish` command.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneralToml {
    pub key: String,
    /// Go style duration, for example `24h` or `90m`.
    pub lifetime: String,
    pub ttl: Option<String>,
    pub resolve: bool,
    pub allow_offline: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PkdnsToml {
    pub dht_bootstrap_nodes: Option<Vec<String>>,
    pub dht_relay_nodes: Option<Vec<Url>>,
    pub dht_request_timeout_ms: Option<NonZeroU64>,
    pub max_retries: u8,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl PkdnsToml {
    /// Build the pkarr client builder from the DHT settings.
    pub fn pkarr_builder(&self) -> pkarr::ClientBuilder {
        let mut builder = pkarr::Client::builder();
        if let Some(bootstrap_nodes) = &self.dht_bootstrap_nodes {
            builder.bootstrap(bootstrap_nodes);
            // Custom bootstrap nodes usually mean a private DHT. Mainnet relays would
            // mix the two networks.
            builder.no_relays();
        }
        if let Some(relays) = &self.dht_relay_nodes {
            // Infallible, the relays are already urls.
            let _ = builder.relays(relays);
        }
        if let Some(request_timeout) = self.dht_request_timeout_ms {
            builder.request_timeout(Duration::from_millis(request_timeout.get()));
        }
        builder
    }

    pub fn retry_settings(&self) -> RetrySettings {
        let mut settings = RetrySettings::new();
        settings
            .max_attempts(NonZeroU8::MIN.saturating_add(self.max_retries))
            .initial_retry_delay(Duration::from_millis(self.initial_retry_delay_ms))
            .max_retry_delay(Duration::from_millis(self.max_retry_delay_ms));
        settings
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContentToml {
    /// HTTP gateway asked whether a path resolves.
    pub gateway: Url,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct LoggingToml {
    pub level: LogLevel,
    #[serde(default)]
    pub module_levels: Vec<TargetLevel>,
}

/// The overall configuration, composed of several subsections.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConfigToml {
    /// Defaults of the publish command.
    pub general: GeneralToml,
    /// Peer‐to‐peer DHT settings (bootstrap, relays, retries).
    pub pkdns: PkdnsToml,
    /// Content gateway.
    pub content: ContentToml,
    /// Log levels. Logging stays off without this section unless set on the command line.
    pub logging: Option<LoggingToml>,
}

impl Default for ConfigToml {
    fn default() -> Self {
        ConfigToml::from_str(DEFAULT_CONFIG).expect("Embedded config.default.toml must be valid")
    }
}

impl ConfigToml {
    /// Read and parse a configuration file, overlaying it on top of the embedded defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigReadError> {
        let raw = fs::read_to_string(path)?;
        Self::from_str_with_defaults(&raw)
    }

    /// Parse a raw TOML string, overlaying it on top of the embedded defaults.
    ///
    /// Arrays set by the user replace the default ones.
    pub fn from_str_with_defaults(raw: &str) -> Result<Self, ConfigReadError> {
        let default_val: toml::Value = DEFAULT_CONFIG.parse()?;
        let user_val: toml::Value = raw.parse()?;

        let merged_val = Merger::new()
            .with_replace_arrays(true)
            .merge(default_val, user_val)
            .map_err(|e| ConfigReadError::ConfigMergeError(e.to_string()))?;

        Ok(merged_val.try_into()?)
    }

    /// Render the embedded sample config but comment out every value,
    /// producing a handy template for end-users.
    pub fn sample_string() -> String {
        SAMPLE_CONFIG
            .lines()
            .map(|line| {
                let trimmed = line.trim_start();
                let is_comment = trimmed.starts_with('#');
                if !is_comment && !trimmed.is_empty() {
                    format!("# {}", line)
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<String>>()
            .join("\n")
    }

    /// Default config that never touches the network.
    pub fn test() -> Self {
        let mut config = Self::default();
        config.general.resolve = false;
        config.pkdns.dht_bootstrap_nodes = Some(vec![]);
        config.pkdns.dht_relay_nodes = None;
        config.pkdns.initial_retry_delay_ms = 1;
        config.pkdns.max_retry_delay_ms = 10;
        config
    }
}

impl FromStr for ConfigToml {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}
