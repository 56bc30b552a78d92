// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Device trees and configurations shared by integration tests

use std::sync::Arc;

use serde_json::{json, Value};
use xapi_client::memory::MemoryXapi;
use xapi_client::Xapi;
use xapi_telemetry::config::Config;
use xapi_telemetry::dispatcher::Dispatcher;
use xapi_telemetry::identity::IdentityCache;
use xapi_telemetry::status::StatusAggregator;
use xapi_telemetry::transport::Transport;

/// A Room Kit with an inside and an outside Room Navigator attached
pub fn room_kit_tree() -> Value {
    json!({
        "Status": {
            "Network": [{
                "id": "1",
                "IPv4": { "Address": "10.0.0.5" },
                "IPv6": { "Address": "fe80::1" },
                "Ethernet": { "MacAddress": "AA:BB:CC:DD:EE:FF" }
            }],
            "SystemUnit": {
                "ProductId": "Cisco Room Kit",
                "ProductType": "Cisco Codec",
                "Software": { "Version": "ce11.1.0.1", "Name": "RoomOS" },
                "Hardware": { "Module": { "SerialNumber": "FOC1234ABCD" } },
                "State": { "NumberOfActiveCalls": 2, "NumberOfInProgressCalls": 0 }
            },
            "Webex": { "DeveloperId": "Y2lzY29zcGFyazovL3VzL0RFVklDRS8x" },
            "RoomAnalytics": {
                "AmbientNoise": { "Level": { "A": "32" } },
                "AmbientTemperature": "21.5",
                "Engagement": { "CloseProximity": "False" },
                "PeopleCount": { "Current": "3" },
                "PeoplePresence": "Yes",
                "RelativeHumidity": "40",
                "Sound": { "Level": { "A": "45" } }
            },
            "Peripherals": {
                "ConnectedDevice": [
                    {
                        "id": "1001",
                        "Name": "Cisco Webex Room Navigator",
                        "Location": "OutsideRoom",
                        "RoomAnalytics": {
                            "AirQuality": { "Index": "4.0" },
                            "AmbientTemperature": "12.0",
                            "RelativeHumidity": "80"
                        }
                    },
                    {
                        "id": "1002",
                        "Name": "Cisco Webex Room Navigator",
                        "Location": "InsideRoom",
                        "RoomAnalytics": {
                            "AirQuality": { "Index": "1.2" },
                            "AmbientTemperature": "23.0",
                            "RelativeHumidity": "55"
                        }
                    }
                ]
            }
        },
        "Configuration": {
            "HttpClient": { "Mode": "Off", "AllowInsecureHTTPS": "False" },
            "RoomAnalytics": {
                "PeopleCountOutOfCall": "Off",
                "PeoplePresenceDetector": "Off"
            }
        }
    })
}

pub fn room_kit() -> MemoryXapi {
    MemoryXapi::new(room_kit_tree())
}

/// Parses `flags` as the YAML body below the server settings
pub fn config(server: &str, flags: &str) -> Arc<Config> {
    let yaml = format!("telemetryServer: {server}\naccessToken: secret\nstartupDelay: 0\n{flags}");
    Arc::new(Config::from_yaml_str(&yaml).unwrap())
}

pub fn dispatcher(config: &Config, xapi: &MemoryXapi, transport: Arc<dyn Transport>) -> Dispatcher {
    let xapi: Arc<dyn Xapi> = Arc::new(xapi.clone());
    Dispatcher::new(
        IdentityCache::new(xapi.clone(), config.id.clone()),
        StatusAggregator::new(
            xapi,
            config.sensors.device.clone(),
            config.sensors.peripherals.clone(),
            config.status.clone(),
        ),
        transport,
        config.telemetry_server.clone(),
        config.access_token.clone(),
    )
}
