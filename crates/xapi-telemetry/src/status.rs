// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Status record built fresh for every dispatch.
//!
//! Three groups are read from the device: the codec's own room analytics, the connected
//! peripherals and the system unit state. A Room Navigator mounted inside the room carries its own
//! sensors; when one is connected its readings replace the codec's for the same fields.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};
use xapi_client::{Path, Xapi};

use crate::config::flags::{DeviceSensorFlags, PeripheralSensorFlags, StatusFlags};

pub const ROOM_ANALYTICS_PATH: &str = "Status/RoomAnalytics";
pub const PERIPHERALS_PATH: &str = "Status/Peripherals";
pub const SYSTEM_STATE_PATH: &str = "Status/SystemUnit/State";

pub const NAVIGATOR_NAME: &str = "Cisco Webex Room Navigator";
pub const NAVIGATOR_LOCATION: &str = "InsideRoom";

/// Status field name to the value reported by the device
pub type StatusRecord = BTreeMap<String, Value>;

/// Sensors of the codec, read from `Status/RoomAnalytics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceSensor {
    AmbientNoiseLevelA,
    AmbientTemperature,
    CloseProximity,
    RelativeHumidity,
    PeoplePresence,
    PeopleCountCurrent,
    ReverberationTime,
    SoundLevelA,
    T3Alarm,
}

impl DeviceSensor {
    pub const ALL: [DeviceSensor; 9] = [
        DeviceSensor::AmbientNoiseLevelA,
        DeviceSensor::AmbientTemperature,
        DeviceSensor::CloseProximity,
        DeviceSensor::RelativeHumidity,
        DeviceSensor::PeoplePresence,
        DeviceSensor::PeopleCountCurrent,
        DeviceSensor::ReverberationTime,
        DeviceSensor::SoundLevelA,
        DeviceSensor::T3Alarm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DeviceSensor::AmbientNoiseLevelA => "AmbientNoiseLevelA",
            DeviceSensor::AmbientTemperature => "AmbientTemperature",
            DeviceSensor::CloseProximity => "CloseProximity",
            DeviceSensor::RelativeHumidity => "RelativeHumidity",
            DeviceSensor::PeoplePresence => "PeoplePresence",
            DeviceSensor::PeopleCountCurrent => "PeopleCountCurrent",
            DeviceSensor::ReverberationTime => "ReverberationTime",
            DeviceSensor::SoundLevelA => "SoundLevelA",
            DeviceSensor::T3Alarm => "T3Alarm",
        }
    }

    /// JSON pointer below `Status/RoomAnalytics`
    fn pointer(self) -> &'static str {
        match self {
            DeviceSensor::AmbientNoiseLevelA => "/AmbientNoise/Level/A",
            DeviceSensor::AmbientTemperature => "/AmbientTemperature",
            DeviceSensor::CloseProximity => "/Engagement/CloseProximity",
            DeviceSensor::RelativeHumidity => "/RelativeHumidity",
            DeviceSensor::PeoplePresence => "/PeoplePresence",
            DeviceSensor::PeopleCountCurrent => "/PeopleCount/Current",
            DeviceSensor::ReverberationTime => "/ReverberationTime",
            DeviceSensor::SoundLevelA => "/Sound/Level/A",
            DeviceSensor::T3Alarm => "/T3Alarm",
        }
    }
}

/// Sensors of a qualifying Room Navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeripheralSensor {
    AirQualityIndex,
    AmbientTemperature,
    RelativeHumidity,
}

impl PeripheralSensor {
    pub const ALL: [PeripheralSensor; 3] = [
        PeripheralSensor::AirQualityIndex,
        PeripheralSensor::AmbientTemperature,
        PeripheralSensor::RelativeHumidity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PeripheralSensor::AirQualityIndex => "AirQualityIndex",
            PeripheralSensor::AmbientTemperature => "AmbientTemperature",
            PeripheralSensor::RelativeHumidity => "RelativeHumidity",
        }
    }

    /// JSON pointer below the connected device entry
    fn pointer(self) -> &'static str {
        match self {
            PeripheralSensor::AirQualityIndex => "/RoomAnalytics/AirQuality/Index",
            PeripheralSensor::AmbientTemperature => "/RoomAnalytics/AmbientTemperature",
            PeripheralSensor::RelativeHumidity => "/RoomAnalytics/RelativeHumidity",
        }
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

fn is_navigator(device: &Value) -> bool {
    device.get("Name").and_then(Value::as_str) == Some(NAVIGATOR_NAME)
        && device.get("Location").and_then(Value::as_str) == Some(NAVIGATOR_LOCATION)
}

/// First connected Room Navigator located inside the room.
pub fn find_navigator(peripherals: &Value) -> Option<&Value> {
    match peripherals.get("ConnectedDevice")? {
        Value::Array(devices) => devices.iter().find(|device| is_navigator(device)),
        device @ Value::Object(_) => Some(device).filter(|device| is_navigator(device)),
        _ => None,
    }
}

#[derive(Clone)]
pub struct StatusAggregator {
    xapi: Arc<dyn Xapi>,
    device: DeviceSensorFlags,
    peripherals: PeripheralSensorFlags,
    status: StatusFlags,
}

impl StatusAggregator {
    pub fn new(
        xapi: Arc<dyn Xapi>,
        device: DeviceSensorFlags,
        peripherals: PeripheralSensorFlags,
        status: StatusFlags,
    ) -> Self {
        StatusAggregator {
            xapi,
            device,
            peripherals,
            status,
        }
    }

    async fn read_group(&self, path: &str) -> Option<Value> {
        match self.xapi.get(&Path::new(path)).await {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Failed to read {path}: {e}");
                None
            }
        }
    }

    /// Reads the three status groups concurrently and flattens the enabled fields into one
    /// record. A group that cannot be read contributes nothing.
    pub async fn collect_status(&self) -> StatusRecord {
        let (room_analytics, peripherals, state) = tokio::join!(
            self.read_group(ROOM_ANALYTICS_PATH),
            self.read_group(PERIPHERALS_PATH),
            self.read_group(SYSTEM_STATE_PATH),
        );
        build_record(
            room_analytics.as_ref(),
            peripherals.as_ref(),
            state.as_ref(),
            &self.device,
            &self.peripherals,
            &self.status,
        )
    }
}

/// Flattens already read groups into a status record.
pub fn build_record(
    room_analytics: Option<&Value>,
    peripherals: Option<&Value>,
    state: Option<&Value>,
    device_flags: &DeviceSensorFlags,
    peripheral_flags: &PeripheralSensorFlags,
    status_flags: &StatusFlags,
) -> StatusRecord {
    let mut record = StatusRecord::new();

    if let Some(room_analytics) = room_analytics {
        for sensor in DeviceSensor::ALL {
            if !device_flags.enabled(sensor) {
                continue;
            }
            match present(room_analytics.pointer(sensor.pointer())) {
                Some(value) => {
                    record.insert(sensor.name().to_string(), value.clone());
                }
                None => debug!("Device does not report {}", sensor.name()),
            }
        }
    }

    match peripherals.and_then(find_navigator) {
        Some(navigator) => {
            for sensor in PeripheralSensor::ALL {
                if !peripheral_flags.enabled(sensor) {
                    continue;
                }
                if let Some(value) = present(navigator.pointer(sensor.pointer())) {
                    record.insert(sensor.name().to_string(), value.clone());
                }
            }
        }
        None => debug!("No {NAVIGATOR_NAME} connected {NAVIGATOR_LOCATION}"),
    }

    if let Some(state) = state {
        if status_flags.number_of_active_calls {
            if let Some(value) = present(state.get("NumberOfActiveCalls")) {
                record.insert("NumberOfActiveCalls".to_string(), value.clone());
            }
        }
    }

    record
}
