// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Telemetry forwarder for a single RoomOS device.
//!
//! The agent keeps a cached identity snapshot of the device, builds a fresh status record from the
//! device's sensors on every dispatch and POSTs both as one JSON payload to a collection endpoint.
//! Dispatches happen on a fixed interval and whenever a subscribed status or event fires. Every
//! device read and every delivery is best-effort: failures are logged and never stop the agent.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod agent;
pub mod applier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod scheduler;
pub mod status;
pub mod subscriptions;
pub mod transport;

pub use agent::{AgentState, TelemetryAgent};
pub use dispatcher::{Dispatcher, TelemetryEvent};
pub use error::DeliveryError;
