// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use xapi_client::XapiError;

/// Errors that can occur while delivering a payload
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to serialize payload: {0}")]
    Serialization(String),

    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("Collector responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Device rejected the request: {0}")]
    Device(#[from] XapiError),

    #[error("Unexpected response from device: {0}")]
    Response(String),
}
