// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! xAPI over the device WebSocket endpoint.
//!
//! RoomOS devices accept JSON-RPC 2.0 on `wss://<device>/ws` after HTTP basic authentication.
//! Requests are correlated with responses by id. Feedback registrations answer with a
//! subscription id, and later changes arrive as `xFeedback/Event` notifications carrying that id
//! together with the changed subtree, rooted at the top of the tree.
//!
//! ```text
//!  JsonRpcXapi::request ──> outbound channel ──> writer task ──> socket
//!        ^                                                         │
//!        └──── pending (id -> oneshot) <──── reader task <─────────┘
//!                                               │
//!                                               └──> feedback (id -> handler)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::{tls, FeedbackHandler, Path, SubscriptionId, Xapi, XapiError};

const FEEDBACK_EVENT_METHOD: &str = "xFeedback/Event";

/// Where and how to reach the device
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// WebSocket URL of the device, e.g. `wss://10.0.0.5/ws`
    pub url: String,
    pub username: String,
    pub password: String,
    /// Devices ship with self-signed certificates, so verification is usually off
    pub verify_tls: bool,
}

type Responder = oneshot::Sender<Result<Value, XapiError>>;

enum Pending {
    Call(Responder),
    Subscribe {
        path: Path,
        handler: FeedbackHandler,
        responder: Responder,
    },
}

struct Registration {
    path: Path,
    handler: FeedbackHandler,
}

struct Shared {
    outbound: mpsc::UnboundedSender<WsMessage>,
    pending: Mutex<HashMap<u64, Pending>>,
    feedback: Mutex<HashMap<u64, Registration>>,
    next_id: AtomicU64,
    closed: CancellationToken,
}

#[derive(Clone)]
pub struct JsonRpcXapi {
    shared: Arc<Shared>,
}

impl JsonRpcXapi {
    pub async fn connect(options: &ConnectOptions) -> Result<Self, XapiError> {
        let mut request = options
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| XapiError::Connect(e.to_string()))?;
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", options.username, options.password));
        let authorization = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| XapiError::Connect(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, authorization);

        let connector = if options.verify_tls {
            None
        } else {
            Some(Connector::Rustls(Arc::new(tls::insecure_client_config()?)))
        };

        let (socket, response) = connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|e| XapiError::Connect(e.to_string()))?;
        debug!("Connected to {} ({})", options.url, response.status());

        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();

        let shared = Arc::new(Shared {
            outbound,
            pending: Mutex::new(HashMap::new()),
            feedback: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            closed: CancellationToken::new(),
        });

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    error!("Failed to write to device: {e}");
                    break;
                }
            }
        });

        let reader = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => reader.handle_message(&text).await,
                    Ok(WsMessage::Close(frame)) => {
                        debug!("Device closed the connection: {frame:?}");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Error reading from device: {e}");
                        break;
                    }
                }
            }
            reader.close().await;
        });

        Ok(Self { shared })
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Cancelled once the device connection is gone. Requests and feedback do not recover after
    /// that, a new connection is needed.
    pub fn disconnected(&self) -> CancellationToken {
        self.shared.closed.child_token()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, XapiError> {
        let (responder, response) = oneshot::channel();
        self.send(method, params, Pending::Call, responder).await?;
        response.await.map_err(|_| XapiError::Disconnected)?
    }

    async fn send(
        &self,
        method: &str,
        params: Value,
        pending: impl FnOnce(Responder) -> Pending,
        responder: Responder,
    ) -> Result<(), XapiError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.shared
            .pending
            .lock()
            .await
            .insert(id, pending(responder));

        // the reader marks the connection closed before failing what is pending
        if self.is_closed() {
            self.shared.pending.lock().await.remove(&id);
            return Err(XapiError::Disconnected);
        }

        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!("Sending {message}");
        if self
            .shared
            .outbound
            .send(WsMessage::Text(message.to_string()))
            .is_err()
        {
            self.shared.pending.lock().await.remove(&id);
            return Err(XapiError::Disconnected);
        }
        Ok(())
    }
}

impl Shared {
    async fn handle_message(&self, text: &str) {
        let message: Value = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding malformed message from device: {e}");
                return;
            }
        };

        if message.get("method").and_then(Value::as_str) == Some(FEEDBACK_EVENT_METHOD) {
            self.route_feedback(message.get("params").unwrap_or(&Value::Null))
                .await;
            return;
        }

        let Some(id) = message.get("id").and_then(Value::as_u64) else {
            trace!("Ignoring message without id: {text}");
            return;
        };
        let Some(pending) = self.pending.lock().await.remove(&id) else {
            warn!("Received response for unknown request {id}");
            return;
        };

        let result = match (message.get("result"), message.get("error")) {
            (_, Some(error)) => Err(rejection(error)),
            (Some(result), None) => Ok(result.clone()),
            (None, None) => Err(XapiError::Protocol(format!(
                "response {id} carries neither result nor error"
            ))),
        };

        match pending {
            Pending::Call(responder) => {
                let _ = responder.send(result);
            }
            Pending::Subscribe {
                path,
                handler,
                responder,
            } => {
                // registered here so that feedback following the response is not lost
                let result = result.and_then(|result| {
                    result.get("Id").and_then(Value::as_u64).ok_or_else(|| {
                        XapiError::Protocol(format!("subscription response without Id: {result}"))
                    })
                });
                if let Ok(subscription) = &result {
                    self.feedback
                        .lock()
                        .await
                        .insert(*subscription, Registration { path, handler });
                }
                let _ = responder.send(result.map(Value::from));
            }
        }
    }

    async fn route_feedback(&self, params: &Value) {
        let Some(id) = params.get("Id").and_then(Value::as_u64) else {
            warn!("Feedback without subscription id: {params}");
            return;
        };

        let (handler, value) = {
            let feedback = self.feedback.lock().await;
            let Some(registration) = feedback.get(&id) else {
                debug!("Feedback for unknown subscription {id}");
                return;
            };
            let value = registration
                .path
                .lookup(params)
                .cloned()
                .unwrap_or_else(|| without_id(params));
            (Arc::clone(&registration.handler), value)
        };

        handler(value);
    }

    async fn close(&self) {
        self.closed.cancel();
        let registrations = {
            let mut feedback = self.feedback.lock().await;
            let registrations = feedback.len();
            feedback.clear();
            registrations
        };
        if registrations > 0 {
            warn!("Connection closed, dropped {registrations} feedback registrations");
        }
        let pending: Vec<Pending> = self.pending.lock().await.drain().map(|(_, p)| p).collect();
        if !pending.is_empty() {
            warn!("Connection closed with {} requests in flight", pending.len());
        }
        for pending in pending {
            let responder = match pending {
                Pending::Call(responder) => responder,
                Pending::Subscribe { responder, .. } => responder,
            };
            let _ = responder.send(Err(XapiError::Disconnected));
        }
    }
}

fn rejection(error: &Value) -> XapiError {
    XapiError::Rejected {
        code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    }
}

fn without_id(params: &Value) -> Value {
    match params {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != "Id")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[async_trait]
impl Xapi for JsonRpcXapi {
    async fn get(&self, path: &Path) -> Result<Value, XapiError> {
        self.request("xGet", json!({ "Path": path.to_params() }))
            .await
    }

    async fn set(&self, path: &Path, value: Value) -> Result<(), XapiError> {
        self.request("xSet", json!({ "Path": path.to_params(), "Value": value }))
            .await
            .map(|_| ())
    }

    async fn on(&self, path: &Path, handler: FeedbackHandler) -> Result<SubscriptionId, XapiError> {
        let (responder, response) = oneshot::channel();
        let params = json!({ "Query": path.to_params(), "NotifyCurrentValue": false });
        let subscribed = path.clone();
        self.send(
            "xFeedback/Subscribe",
            params,
            move |responder| Pending::Subscribe {
                path: subscribed,
                handler,
                responder,
            },
            responder,
        )
        .await?;

        let id = response.await.map_err(|_| XapiError::Disconnected)??;
        id.as_u64()
            .map(SubscriptionId)
            .ok_or_else(|| XapiError::Protocol(format!("invalid subscription id {id}")))
    }

    async fn command(&self, path: &Path, params: Value) -> Result<Value, XapiError> {
        self.request(&path.command_method(), params).await
    }
}
