// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors returned by the device's xAPI
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum XapiError {
    #[error("Device rejected request: {message} (code {code})")]
    Rejected { code: i64, message: String },

    #[error("No match on path {0}")]
    NoSuchPath(String),

    #[error("Failed to connect to device: {0}")]
    Connect(String),

    #[error("Malformed message from device: {0}")]
    Protocol(String),

    #[error("Connection to device closed")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = XapiError::Rejected {
            code: 3,
            message: "No match on Path argument".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Device rejected request: No match on Path argument (code 3)"
        );
        assert_eq!(
            XapiError::NoSuchPath("Status/Foo".into()).to_string(),
            "No match on path Status/Foo"
        );
    }
}
