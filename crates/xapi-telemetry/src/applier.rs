// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info};
use xapi_client::{Path, Xapi};

use crate::config::flags::DeviceSensorFlags;

pub const HTTP_CLIENT_MODE_PATH: &str = "Configuration/HttpClient/Mode";
pub const HTTP_CLIENT_INSECURE_PATH: &str = "Configuration/HttpClient/AllowInsecureHTTPS";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

struct Setting {
    path: &'static str,
    value: Value,
    /// Only written when the device exposes the node
    optional: bool,
}

fn on_off(enabled: bool) -> Value {
    json!(if enabled { "On" } else { "Off" })
}

fn settings(sensors: &DeviceSensorFlags) -> Vec<Setting> {
    vec![
        Setting {
            path: HTTP_CLIENT_MODE_PATH,
            value: json!("On"),
            optional: false,
        },
        Setting {
            path: HTTP_CLIENT_INSECURE_PATH,
            value: json!("True"),
            optional: false,
        },
        Setting {
            path: "Configuration/RoomAnalytics/PeopleCountOutOfCall",
            value: on_off(sensors.people_count_current),
            optional: true,
        },
        Setting {
            path: "Configuration/RoomAnalytics/PeoplePresenceDetector",
            value: on_off(sensors.people_presence),
            optional: true,
        },
        Setting {
            path: "Configuration/RoomAnalytics/AmbientNoiseEstimation/Mode",
            value: on_off(sensors.ambient_noise_level_a),
            optional: true,
        },
        Setting {
            path: "Configuration/RoomAnalytics/ReverberationTime/Mode",
            value: on_off(sensors.reverberation_time),
            optional: true,
        },
        Setting {
            path: "Configuration/RoomAnalytics/T3AlarmDetection/Mode",
            value: on_off(sensors.t3_alarm),
            optional: true,
        },
    ]
}

/// Enables the device's HTTP client and switches the room analytics detectors on or off to match
/// the sensor flags. Runs once before any telemetry is sent.
pub async fn apply_configuration(xapi: &Arc<dyn Xapi>, sensors: &DeviceSensorFlags) -> ApplySummary {
    info!("Applying device configuration");
    let mut summary = ApplySummary::default();

    for setting in settings(sensors) {
        let path = Path::new(setting.path);
        if setting.optional && !xapi.exists(&path).await {
            debug!("Device does not support {path}, skipping");
            summary.skipped += 1;
            continue;
        }
        match xapi.set(&path, setting.value.clone()).await {
            Ok(()) => {
                debug!("Set {path} to {}", setting.value);
                summary.applied += 1;
            }
            Err(e) => {
                error!("Failed to set {path}: {e}");
                summary.failed += 1;
            }
        }
    }

    info!(
        "Device configuration applied: {} set, {} unsupported, {} failed",
        summary.applied, summary.skipped, summary.failed
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use xapi_client::memory::MemoryXapi;
    use xapi_client::XapiError;

    fn room_kit() -> MemoryXapi {
        MemoryXapi::new(json!({
            "Configuration": {
                "HttpClient": { "Mode": "Off", "AllowInsecureHTTPS": "False" },
                "RoomAnalytics": {
                    "PeopleCountOutOfCall": "Off",
                    "PeoplePresenceDetector": "Off",
                    "AmbientNoiseEstimation": { "Mode": "Off" }
                }
            }
        }))
    }

    #[tokio::test]
    async fn test_apply_writes_supported_settings() {
        let xapi = room_kit();
        let sensors = DeviceSensorFlags {
            people_count_current: true,
            ambient_noise_level_a: true,
            ..Default::default()
        };

        let summary = apply_configuration(&(Arc::new(xapi.clone()) as Arc<dyn Xapi>), &sensors).await;
        assert_eq!(
            summary,
            ApplySummary {
                applied: 5,
                skipped: 2,
                failed: 0
            }
        );
        assert_eq!(
            xapi.writes(),
            vec![
                (Path::new(HTTP_CLIENT_MODE_PATH), json!("On")),
                (Path::new(HTTP_CLIENT_INSECURE_PATH), json!("True")),
                (
                    Path::new("Configuration/RoomAnalytics/PeopleCountOutOfCall"),
                    json!("On")
                ),
                (
                    Path::new("Configuration/RoomAnalytics/PeoplePresenceDetector"),
                    json!("Off")
                ),
                (
                    Path::new("Configuration/RoomAnalytics/AmbientNoiseEstimation/Mode"),
                    json!("On")
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_http_client_is_written_without_existence_check() {
        let xapi = MemoryXapi::default();
        let summary = apply_configuration(
            &(Arc::new(xapi.clone()) as Arc<dyn Xapi>),
            &DeviceSensorFlags::default(),
        )
        .await;
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.skipped, 5);
        assert!(!xapi.reads().contains(&Path::new(HTTP_CLIENT_MODE_PATH)));
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_sequence() {
        let xapi = room_kit();
        xapi.fail(
            HTTP_CLIENT_INSECURE_PATH,
            XapiError::Rejected {
                code: 1,
                message: "Permission denied".to_string(),
            },
        );
        let summary = apply_configuration(
            &(Arc::new(xapi.clone()) as Arc<dyn Xapi>),
            &DeviceSensorFlags::default(),
        )
        .await;
        assert_eq!(
            summary,
            ApplySummary {
                applied: 4,
                skipped: 2,
                failed: 1
            }
        );
    }
}
