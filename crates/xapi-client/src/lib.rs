// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client side of the xAPI exposed by RoomOS collaboration devices.
//!
//! The device publishes a tree of status, configuration, event and command nodes. This crate
//! models the four operations a consumer needs against that tree behind the [`Xapi`] trait:
//! read a node, write a configuration node, subscribe to changes below a node and invoke a
//! command. Two implementations are provided:
//!
//! - [`jsonrpc::JsonRpcXapi`] speaks JSON-RPC 2.0 over the device's WebSocket endpoint.
//! - [`memory::MemoryXapi`] keeps the tree in memory, for tests and offline runs.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub mod error;
pub mod jsonrpc;
pub mod memory;
pub mod path;
mod tls;

pub use error::XapiError;
pub use path::{Namespace, Path};

/// Callback fired with the new value every time a subscribed node changes.
pub type FeedbackHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Identifier the device assigns to a feedback registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait Xapi: Send + Sync {
    /// Reads the value of a status or configuration node.
    async fn get(&self, path: &Path) -> Result<Value, XapiError>;

    /// Writes a configuration node.
    async fn set(&self, path: &Path, value: Value) -> Result<(), XapiError>;

    /// Registers `handler` for changes of the node at `path` and everything below it.
    /// Delivery order across distinct registrations is not guaranteed.
    async fn on(&self, path: &Path, handler: FeedbackHandler) -> Result<SubscriptionId, XapiError>;

    /// Invokes the command at `path`.
    async fn command(&self, path: &Path, params: Value) -> Result<Value, XapiError>;

    /// True when the device exposes the node at `path`.
    async fn exists(&self, path: &Path) -> bool {
        self.get(path).await.is_ok()
    }
}
