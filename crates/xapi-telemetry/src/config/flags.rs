// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Inclusion flags.
//!
//! Each group maps a field name, spelled the way the device names it, to whether the field is
//! collected (or, for `status` and `event`, subscribed to). Flags that are not mentioned are off
//! and unknown names are rejected so that typos do not silently disable a field.

use serde::Deserialize;

use crate::identity::IdentityField;
use crate::status::{DeviceSensor, PeripheralSensor};
use crate::subscriptions::Feedback;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityFlags {
    #[serde(rename = "IPAddress")]
    pub ip_address: bool,
    #[serde(rename = "IPAddressV6")]
    pub ip_address_v6: bool,
    #[serde(rename = "MACAddress")]
    pub mac_address: bool,
    #[serde(rename = "ProductID")]
    pub product_id: bool,
    #[serde(rename = "ProductType")]
    pub product_type: bool,
    #[serde(rename = "SWVersion")]
    pub sw_version: bool,
    #[serde(rename = "SerialNumber")]
    pub serial_number: bool,
    #[serde(rename = "SystemName")]
    pub system_name: bool,
    #[serde(rename = "DeviceId")]
    pub device_id: bool,
}

impl IdentityFlags {
    pub fn enabled(&self, field: IdentityField) -> bool {
        match field {
            IdentityField::IpAddress => self.ip_address,
            IdentityField::IpAddressV6 => self.ip_address_v6,
            IdentityField::MacAddress => self.mac_address,
            IdentityField::ProductId => self.product_id,
            IdentityField::ProductType => self.product_type,
            IdentityField::SwVersion => self.sw_version,
            IdentityField::SerialNumber => self.serial_number,
            IdentityField::SystemName => self.system_name,
            IdentityField::DeviceId => self.device_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
pub struct DeviceSensorFlags {
    pub ambient_noise_level_a: bool,
    pub ambient_temperature: bool,
    pub close_proximity: bool,
    pub relative_humidity: bool,
    pub people_presence: bool,
    pub people_count_current: bool,
    pub reverberation_time: bool,
    pub sound_level_a: bool,
    #[serde(rename = "T3Alarm")]
    pub t3_alarm: bool,
}

impl DeviceSensorFlags {
    pub fn enabled(&self, sensor: DeviceSensor) -> bool {
        match sensor {
            DeviceSensor::AmbientNoiseLevelA => self.ambient_noise_level_a,
            DeviceSensor::AmbientTemperature => self.ambient_temperature,
            DeviceSensor::CloseProximity => self.close_proximity,
            DeviceSensor::RelativeHumidity => self.relative_humidity,
            DeviceSensor::PeoplePresence => self.people_presence,
            DeviceSensor::PeopleCountCurrent => self.people_count_current,
            DeviceSensor::ReverberationTime => self.reverberation_time,
            DeviceSensor::SoundLevelA => self.sound_level_a,
            DeviceSensor::T3Alarm => self.t3_alarm,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
pub struct PeripheralSensorFlags {
    pub air_quality_index: bool,
    pub ambient_temperature: bool,
    pub relative_humidity: bool,
}

impl PeripheralSensorFlags {
    pub fn enabled(&self, sensor: PeripheralSensor) -> bool {
        match sensor {
            PeripheralSensor::AirQualityIndex => self.air_quality_index,
            PeripheralSensor::AmbientTemperature => self.ambient_temperature,
            PeripheralSensor::RelativeHumidity => self.relative_humidity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorFlags {
    pub device: DeviceSensorFlags,
    // early configuration files carry the misspelled key
    #[serde(alias = "periherals")]
    pub peripherals: PeripheralSensorFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
pub struct StatusFlags {
    pub number_of_active_calls: bool,
    pub people_presence: bool,
    pub people_count_current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
pub struct EventFlags {
    pub boot_event: bool,
    pub presentation_started: bool,
    pub presentation_stopped: bool,
}

/// Whether a status change or event is subscribed to.
pub fn feedback_enabled(status: &StatusFlags, event: &EventFlags, feedback: Feedback) -> bool {
    match feedback {
        Feedback::NumberOfActiveCalls => status.number_of_active_calls,
        Feedback::PeoplePresence => status.people_presence,
        Feedback::PeopleCountCurrent => status.people_count_current,
        Feedback::BootEvent => event.boot_event,
        Feedback::PresentationStarted => event.presentation_started,
        Feedback::PresentationStopped => event.presentation_stopped,
    }
}
