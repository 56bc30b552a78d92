// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;

use crate::config::yaml::YamlConfig;
use crate::config::{ConfigError, ConfigSource, Delivery};

pub const ENV_TELEMETRY_SERVER: &str = "XAPI_TELEMETRY_SERVER";
pub const ENV_ACCESS_TOKEN: &str = "XAPI_TELEMETRY_ACCESS_TOKEN";
pub const ENV_INTERVAL_MS: &str = "XAPI_TELEMETRY_INTERVAL_MS";
pub const ENV_DELIVERY: &str = "XAPI_TELEMETRY_DELIVERY";
pub const ENV_LOG_LEVEL: &str = "XAPI_TELEMETRY_LOG_LEVEL";
pub const ENV_DEVICE_URL: &str = "XAPI_TELEMETRY_DEVICE_URL";
pub const ENV_DEVICE_USERNAME: &str = "XAPI_TELEMETRY_DEVICE_USERNAME";
pub const ENV_DEVICE_PASSWORD: &str = "XAPI_TELEMETRY_DEVICE_PASSWORD";

/// Overrides the endpoint, secrets and connection settings from the environment. Inclusion flags
/// only come from the file.
#[allow(clippy::module_name_repetitions)]
pub struct EnvConfigSource;

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl ConfigSource for EnvConfigSource {
    fn load(&self, config: &mut YamlConfig) -> Result<(), ConfigError> {
        if let Some(server) = var(ENV_TELEMETRY_SERVER) {
            config.telemetry_server = Some(server);
        }
        if let Some(token) = var(ENV_ACCESS_TOKEN) {
            config.access_token = Some(token);
        }
        if let Some(interval) = var(ENV_INTERVAL_MS) {
            let interval = interval.trim().parse::<u64>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{ENV_INTERVAL_MS} must be a whole number of milliseconds, got '{interval}'"
                ))
            })?;
            config.interval_time = Some(interval);
        }
        if let Some(delivery) = var(ENV_DELIVERY) {
            config.delivery = Some(match delivery.to_lowercase().as_str() {
                "xapi" => Delivery::Xapi,
                "direct" => Delivery::Direct,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "{ENV_DELIVERY} must be 'xapi' or 'direct', got '{other}'"
                    )))
                }
            });
        }
        if let Some(level) = var(ENV_LOG_LEVEL) {
            config.log_level = Some(level.to_lowercase());
        }
        if let Some(url) = var(ENV_DEVICE_URL) {
            config.device.url = Some(url);
        }
        if let Some(username) = var(ENV_DEVICE_USERNAME) {
            config.device.username = Some(username);
        }
        if let Some(password) = var(ENV_DEVICE_PASSWORD) {
            config.device.password = Some(password);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env(ENV_ACCESS_TOKEN, "secret");
            jail.set_env(ENV_INTERVAL_MS, "30000");
            jail.set_env(ENV_DELIVERY, "Direct");
            jail.set_env(ENV_DEVICE_PASSWORD, "");

            let mut config = YamlConfig {
                access_token: Some("from-file".to_string()),
                device: crate::config::yaml::DeviceYamlConfig {
                    password: Some("from-file".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            };
            EnvConfigSource.load(&mut config).unwrap();

            assert_eq!(config.access_token.as_deref(), Some("secret"));
            assert_eq!(config.interval_time, Some(30000));
            assert_eq!(config.delivery, Some(Delivery::Direct));
            // empty variables do not clear file values
            assert_eq!(config.device.password.as_deref(), Some("from-file"));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_interval() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env(ENV_INTERVAL_MS, "two minutes");

            let result = EnvConfigSource.load(&mut YamlConfig::default());
            assert!(matches!(result, Err(ConfigError::Invalid(_))));
            Ok(())
        });
    }
}
