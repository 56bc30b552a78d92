// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process configuration.
//!
//! Sources are applied in order, later ones winning:
//! 1. Defaults
//! 2. YAML file (`xapi-telemetry.yaml`)
//! 3. Environment variables (`XAPI_TELEMETRY_*`)
//!
//! The merged result is validated once into [`Config`], which is immutable for the lifetime of
//! the process.

pub mod env;
pub mod flags;
pub mod yaml;

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::config::env::EnvConfigSource;
use crate::config::flags::{EventFlags, IdentityFlags, SensorFlags, StatusFlags};
use crate::config::yaml::{YamlConfig, YamlConfigSource};

pub const DEFAULT_CONFIG_FILE: &str = "xapi-telemetry.yaml";
pub const DEFAULT_INTERVAL_MS: u64 = 120_000;
pub const DEFAULT_STARTUP_DELAY_MS: u64 = 2_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[allow(clippy::module_name_repetitions)]
pub trait ConfigSource {
    fn load(&self, config: &mut YamlConfig) -> Result<(), ConfigError>;
}

#[derive(Default)]
#[allow(clippy::module_name_repetitions)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
}

#[allow(clippy::module_name_repetitions)]
impl ConfigBuilder {
    #[must_use]
    pub fn add_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn build(&self) -> Result<Config, ConfigError> {
        let mut merged = YamlConfig::default();
        for source in &self.sources {
            source.load(&mut merged)?;
        }
        Config::try_from(merged)
    }
}

/// How payloads leave the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// The device's own HTTP client (`Command/HttpClient/Post`)
    #[default]
    Xapi,
    /// Straight from this process
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub url: Option<String>,
    pub username: String,
    pub password: String,
    pub verify_tls: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telemetry_server: Url,
    pub access_token: String,
    pub interval: Duration,
    pub startup_delay: Duration,
    pub request_timeout: Option<Duration>,
    pub delivery: Delivery,
    pub log_level: String,
    pub device: DeviceConfig,
    pub id: IdentityFlags,
    pub sensors: SensorFlags,
    pub status: StatusFlags,
    pub event: EventFlags,
}

impl Config {
    /// Parses a YAML document without consulting the environment.
    pub fn from_yaml_str(yaml: &str) -> Result<Config, ConfigError> {
        ConfigBuilder::default()
            .add_source(Box::new(YamlConfigSource::string(yaml)))
            .build()
    }
}

/// Loads the file at `path` (absent is fine) and applies environment overrides.
#[allow(clippy::module_name_repetitions)]
pub fn get_config(path: &Path) -> Result<Config, ConfigError> {
    ConfigBuilder::default()
        .add_source(Box::new(YamlConfigSource::file(path)))
        .add_source(Box::new(EnvConfigSource))
        .build()
}

impl TryFrom<YamlConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: YamlConfig) -> Result<Self, Self::Error> {
        let server = raw
            .telemetry_server
            .ok_or_else(|| ConfigError::Invalid("telemetryServer is required".to_string()))?;
        let telemetry_server = Url::parse(server.trim()).map_err(|e| {
            ConfigError::Invalid(format!("telemetryServer '{server}' is not a valid URL: {e}"))
        })?;
        if !matches!(telemetry_server.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "telemetryServer must use http or https, got '{}'",
                telemetry_server.scheme()
            )));
        }

        let interval_ms = raw.interval_time.unwrap_or(DEFAULT_INTERVAL_MS);
        if interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "intervalTime must be greater than 0".to_string(),
            ));
        }

        let log_level = raw
            .log_level
            .map(|level| level.to_lowercase())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        if !VALID_LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{log_level}'. Must be one of: trace, debug, info, warn, error"
            )));
        }

        if let Some(url) = &raw.device.url {
            let parsed = Url::parse(url).map_err(|e| {
                ConfigError::Invalid(format!("device.url '{url}' is not a valid URL: {e}"))
            })?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(ConfigError::Invalid(format!(
                    "device.url must use ws or wss, got '{}'",
                    parsed.scheme()
                )));
            }
        }

        let access_token = raw.access_token.unwrap_or_default();

        Ok(Config {
            telemetry_server,
            access_token,
            interval: Duration::from_millis(interval_ms),
            startup_delay: Duration::from_millis(
                raw.startup_delay.unwrap_or(DEFAULT_STARTUP_DELAY_MS),
            ),
            request_timeout: raw.request_timeout.map(Duration::from_millis),
            delivery: raw.delivery.unwrap_or_default(),
            log_level,
            device: DeviceConfig {
                url: raw.device.url,
                username: raw.device.username.unwrap_or_default(),
                password: raw.device.password.unwrap_or_default(),
                verify_tls: raw.device.verify_tls.unwrap_or(false),
            },
            id: raw.id,
            sensors: raw.sensors,
            status: raw.status,
            event: raw.event,
        })
    }
}
