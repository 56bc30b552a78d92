// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! YAML configuration file.
//!
//! ```yaml
//! telemetryServer: https://collector.example.com/telemetry
//! accessToken: <bearer token>
//! intervalTime: 120000
//! device:
//!   url: wss://10.0.0.5/ws
//!   username: telemetry
//!   password: <password>
//! id:
//!   IPAddress: true
//!   SerialNumber: true
//! sensors:
//!   device:
//!     AmbientNoiseLevelA: true
//!   peripherals:
//!     AirQualityIndex: true
//! status:
//!   NumberOfActiveCalls: true
//! event:
//!   BootEvent: true
//! ```

use std::path::Path;

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::Deserialize;

use crate::config::flags::{EventFlags, IdentityFlags, SensorFlags, StatusFlags};
use crate::config::{ConfigError, ConfigSource, Delivery};

/// Configuration as written by the operator, before validation. Every source merges into it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YamlConfig {
    pub telemetry_server: Option<String>,
    pub access_token: Option<String>,
    /// milliseconds
    pub interval_time: Option<u64>,
    /// milliseconds
    pub startup_delay: Option<u64>,
    /// milliseconds, direct delivery only
    pub request_timeout: Option<u64>,
    pub delivery: Option<Delivery>,
    pub log_level: Option<String>,
    pub device: DeviceYamlConfig,
    pub id: IdentityFlags,
    pub sensors: SensorFlags,
    pub status: StatusFlags,
    pub event: EventFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceYamlConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub verify_tls: Option<bool>,
}

#[allow(clippy::module_name_repetitions)]
pub struct YamlConfigSource {
    figment: Figment,
}

impl YamlConfigSource {
    /// A missing file yields an empty configuration.
    pub fn file(path: &Path) -> Self {
        Self {
            figment: Figment::new().merge(Yaml::file(path)),
        }
    }

    pub fn string(yaml: &str) -> Self {
        Self {
            figment: Figment::new().merge(Yaml::string(yaml)),
        }
    }
}

impl ConfigSource for YamlConfigSource {
    fn load(&self, config: &mut YamlConfig) -> Result<(), ConfigError> {
        let yaml = self
            .figment
            .extract::<YamlConfig>()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        merge_config(config, yaml);
        Ok(())
    }
}

fn merge_config(config: &mut YamlConfig, yaml: YamlConfig) {
    macro_rules! merge_option {
        ($($field:ident).+) => {
            if yaml.$($field).+.is_some() {
                config.$($field).+ = yaml.$($field).+;
            }
        };
    }

    merge_option!(telemetry_server);
    merge_option!(access_token);
    merge_option!(interval_time);
    merge_option!(startup_delay);
    merge_option!(request_timeout);
    merge_option!(delivery);
    merge_option!(log_level);
    merge_option!(device.url);
    merge_option!(device.username);
    merge_option!(device.password);
    merge_option!(device.verify_tls);

    config.id = yaml.id;
    config.sensors = yaml.sensors;
    config.status = yaml.status;
    config.event = yaml.event;
}
