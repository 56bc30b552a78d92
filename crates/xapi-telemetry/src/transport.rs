// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of serialized payloads to the collection endpoint.
//!
//! By default payloads leave through the device's own HTTP client, so the endpoint only needs to be
//! reachable from the device. [`ReqwestTransport`] posts from the host running the agent instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde_json::{json, Value};
use tracing::debug;
use xapi_client::{Path, Xapi};

use crate::error::DeliveryError;

pub const HTTP_POST_COMMAND: &str = "Command/HttpClient/Post";
pub const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: Url,
    pub access_token: String,
    pub body: String,
}

impl OutboundRequest {
    fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one POST and returns the HTTP status. Non-2xx statuses are errors.
    async fn post(&self, request: OutboundRequest) -> Result<u16, DeliveryError>;
}

fn check_status(status: u16, body: String) -> Result<u16, DeliveryError> {
    if (200..300).contains(&status) {
        Ok(status)
    } else {
        Err(DeliveryError::Status { status, body })
    }
}

/// Posts through `Command/HttpClient/Post` on the device.
pub struct XapiHttpTransport {
    xapi: Arc<dyn Xapi>,
}

impl XapiHttpTransport {
    pub fn new(xapi: Arc<dyn Xapi>) -> Self {
        XapiHttpTransport { xapi }
    }
}

fn status_code(result: &Value) -> Option<u16> {
    match result.get("StatusCode")? {
        Value::String(code) => code.trim().parse().ok(),
        Value::Number(code) => code.as_u64().and_then(|code| u16::try_from(code).ok()),
        _ => None,
    }
}

#[async_trait]
impl Transport for XapiHttpTransport {
    async fn post(&self, request: OutboundRequest) -> Result<u16, DeliveryError> {
        let params = json!({
            "AllowInsecureHTTPS": "True",
            "Header": [
                format!("Content-Type: {CONTENT_TYPE_JSON}"),
                format!("Authorization: {}", request.authorization()),
            ],
            "ResultBody": "PlainText",
            "Url": request.url.as_str(),
            "body": request.body,
        });

        let result = self
            .xapi
            .command(&Path::new(HTTP_POST_COMMAND), params)
            .await?;
        let status = status_code(&result).ok_or_else(|| {
            DeliveryError::Response(format!("missing StatusCode in {result}"))
        })?;
        let body = result
            .get("Body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        check_status(status, body)
    }
}

/// Posts directly from the agent host. Certificates are not verified, matching what the device's
/// HTTP client is configured to accept.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, DeliveryError> {
        let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, request: OutboundRequest) -> Result<u16, DeliveryError> {
        let authorization = request.authorization();
        let response = self
            .client
            .post(request.url)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header(AUTHORIZATION, authorization)
            .body(request.body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!("Collector responded with {status}");
        check_status(status, body)
    }
}
