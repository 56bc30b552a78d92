// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use reqwest::Url;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::DeliveryError;
use crate::identity::{IdentityCache, IdentitySnapshot};
use crate::status::{StatusAggregator, StatusRecord};
use crate::transport::{OutboundRequest, Transport};

/// Result of one dispatch: the collector's HTTP status or why delivery failed.
pub type DispatchOutcome = Result<u16, DeliveryError>;

/// A status change or event that triggered a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub name: String,
    pub value: Value,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        TelemetryEvent {
            name: name.into(),
            value,
        }
    }
}

/// Body of one POST. The event, when present, is keyed by its name next to `id` and `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub id: IdentitySnapshot,
    pub status: StatusRecord,
    pub event: Option<TelemetryEvent>,
}

impl Serialize for Payload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.event.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("status", &self.status)?;
        if let Some(event) = &self.event {
            map.serialize_entry(&event.name, &event.value)?;
        }
        map.end()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    identity: IdentityCache,
    status: StatusAggregator,
    transport: Arc<dyn Transport>,
    telemetry_server: Url,
    access_token: String,
}

impl Dispatcher {
    pub fn new(
        identity: IdentityCache,
        status: StatusAggregator,
        transport: Arc<dyn Transport>,
        telemetry_server: Url,
        access_token: String,
    ) -> Self {
        Dispatcher {
            identity,
            status,
            transport,
            telemetry_server,
            access_token,
        }
    }

    /// Builds a payload from the cached identity and a fresh status record.
    pub async fn build_payload(&self, event: Option<TelemetryEvent>) -> Payload {
        Payload {
            id: self.identity.snapshot().await,
            status: self.status.collect_status().await,
            event,
        }
    }

    /// Sends one payload. Failures are logged and returned, never retried.
    pub async fn dispatch(&self, event: Option<TelemetryEvent>) -> DispatchOutcome {
        match &event {
            Some(event) => info!("Sending telemetry for {}", event.name),
            None => info!("Sending telemetry"),
        }

        let payload = self.build_payload(event).await;
        let outcome = self.send(&payload).await;
        match &outcome {
            Ok(status) => info!("Status: {status}"),
            Err(e) => error!("Failed to send telemetry: {e}"),
        }
        outcome
    }

    async fn send(&self, payload: &Payload) -> DispatchOutcome {
        let body = serde_json::to_string(payload)
            .map_err(|e| DeliveryError::Serialization(e.to_string()))?;
        debug!("Payload: {body}");
        self.transport
            .post(OutboundRequest {
                url: self.telemetry_server.clone(),
                access_token: self.access_token.clone(),
                body,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::flags::{
        DeviceSensorFlags, IdentityFlags, PeripheralSensorFlags, StatusFlags,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tracing_test::traced_test;
    use xapi_client::memory::MemoryXapi;

    #[derive(Default)]
    struct RecordingTransport {
        requests: Mutex<Vec<OutboundRequest>>,
        status: u16,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn post(&self, request: OutboundRequest) -> Result<u16, DeliveryError> {
            self.requests.lock().unwrap().push(request);
            if self.status == 0 {
                Err(DeliveryError::Transport("connection refused".to_string()))
            } else {
                Ok(self.status)
            }
        }
    }

    fn dispatcher(transport: Arc<RecordingTransport>) -> Dispatcher {
        let xapi = Arc::new(MemoryXapi::new(json!({
            "Status": {
                "SystemUnit": {
                    "State": { "NumberOfActiveCalls": 2 },
                    "Hardware": { "Module": { "SerialNumber": "FOC1234ABCD" } }
                }
            }
        })));
        let identity = IdentityCache::new(
            xapi.clone(),
            IdentityFlags {
                serial_number: true,
                ..Default::default()
            },
        );
        let status = StatusAggregator::new(
            xapi,
            DeviceSensorFlags::default(),
            PeripheralSensorFlags::default(),
            StatusFlags {
                number_of_active_calls: true,
                ..Default::default()
            },
        );
        Dispatcher::new(
            identity,
            status,
            transport,
            Url::parse("https://collector.example.com/ingest").unwrap(),
            "secret".to_string(),
        )
    }

    #[test]
    fn test_payload_without_event() {
        let payload = Payload {
            id: IdentitySnapshot::from([("SerialNumber".to_string(), "FOC1".to_string())]),
            status: StatusRecord::new(),
            event: None,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "id": { "SerialNumber": "FOC1" }, "status": {} })
        );
    }

    #[test]
    fn test_payload_with_event() {
        let payload = Payload {
            id: IdentitySnapshot::new(),
            status: StatusRecord::from([("NumberOfActiveCalls".to_string(), json!(1))]),
            event: Some(TelemetryEvent::new("NumberOfActiveCalls", json!("1"))),
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"id":{},"status":{"NumberOfActiveCalls":1},"NumberOfActiveCalls":"1"}"#
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_dispatch_posts_payload() {
        let transport = Arc::new(RecordingTransport {
            status: 200,
            ..Default::default()
        });
        let dispatcher = dispatcher(transport.clone());
        dispatcher.identity.refresh_identity().await;

        let outcome = dispatcher
            .dispatch(Some(TelemetryEvent::new("BootEvent", json!({ "Level": "1" }))))
            .await;
        assert_eq!(outcome, Ok(200));
        assert!(logs_contain("Status: 200"));

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].access_token, "secret");
        assert_eq!(requests[0].url.as_str(), "https://collector.example.com/ingest");
        let body: Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(
            body,
            json!({
                "id": { "SerialNumber": "FOC1234ABCD" },
                "status": { "NumberOfActiveCalls": 2 },
                "BootEvent": { "Level": "1" }
            })
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_dispatch_failure_is_logged() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = dispatcher(transport.clone());

        let outcome = dispatcher.dispatch(None).await;
        assert!(matches!(outcome, Err(DeliveryError::Transport(_))));
        assert!(logs_contain("Failed to send telemetry"));
        assert_eq!(transport.requests.lock().unwrap().len(), 1);
    }
}
