// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock transports for integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;
use xapi_telemetry::transport::{OutboundRequest, Transport};
use xapi_telemetry::DeliveryError;

/// Holds the first POST until [`GatedTransport::release`] is called. Later POSTs go through.
#[derive(Default)]
pub struct GatedTransport {
    gate: Notify,
    started: AtomicUsize,
    completed: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
}

impl GatedTransport {
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn post(&self, request: OutboundRequest) -> Result<u16, DeliveryError> {
        let body = serde_json::from_str(&request.body).unwrap();
        self.bodies.lock().unwrap().push(body);
        if self.started.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.notified().await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(200)
    }
}

/// Polls `condition` every 10 ms, failing the test after 5 s.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
