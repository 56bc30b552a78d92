// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cached identity of the device.
//!
//! Identity fields rarely change, so they are read once at startup and then only re-read when the
//! device reports a change below `Status/Network`. Each refresh replaces the whole snapshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use xapi_client::{FeedbackHandler, Path, SubscriptionId, Xapi, XapiError};

use crate::config::flags::IdentityFlags;

pub const NETWORK_PATH: &str = "Status/Network";

/// Identity field name to its value as a string
pub type IdentitySnapshot = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityField {
    IpAddress,
    IpAddressV6,
    MacAddress,
    ProductId,
    ProductType,
    SwVersion,
    SerialNumber,
    SystemName,
    DeviceId,
}

impl IdentityField {
    pub const ALL: [IdentityField; 9] = [
        IdentityField::IpAddress,
        IdentityField::IpAddressV6,
        IdentityField::MacAddress,
        IdentityField::ProductId,
        IdentityField::ProductType,
        IdentityField::SwVersion,
        IdentityField::SerialNumber,
        IdentityField::SystemName,
        IdentityField::DeviceId,
    ];

    /// Key in the payload's `id` object
    pub fn name(self) -> &'static str {
        match self {
            IdentityField::IpAddress => "IPAddress",
            IdentityField::IpAddressV6 => "IPAddressV6",
            IdentityField::MacAddress => "MACAddress",
            IdentityField::ProductId => "ProductID",
            IdentityField::ProductType => "ProductType",
            IdentityField::SwVersion => "SWVersion",
            IdentityField::SerialNumber => "SerialNumber",
            IdentityField::SystemName => "SystemName",
            IdentityField::DeviceId => "DeviceId",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            IdentityField::IpAddress => "Status/Network/1/IPv4/Address",
            IdentityField::IpAddressV6 => "Status/Network/1/IPv6/Address",
            IdentityField::MacAddress => "Status/Network/1/Ethernet/MacAddress",
            IdentityField::ProductId => "Status/SystemUnit/ProductId",
            IdentityField::ProductType => "Status/SystemUnit/ProductType",
            IdentityField::SwVersion => "Status/SystemUnit/Software/Version",
            IdentityField::SerialNumber => "Status/SystemUnit/Hardware/Module/SerialNumber",
            IdentityField::SystemName => "Status/SystemUnit/Software/Name",
            IdentityField::DeviceId => "Status/Webex/DeveloperId",
        }
    }

    /// Read from below `Status/Network`
    fn is_network(self) -> bool {
        matches!(
            self,
            IdentityField::IpAddress | IdentityField::IpAddressV6 | IdentityField::MacAddress
        )
    }
}

/// Renders a device value the way it is reported in the payload. `None` for null.
fn render(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(value) => Some(value),
        other => Some(other.to_string()),
    }
}

#[derive(Clone)]
pub struct IdentityCache {
    xapi: Arc<dyn Xapi>,
    flags: IdentityFlags,
    snapshot: Arc<RwLock<IdentitySnapshot>>,
    watching: Arc<AtomicBool>,
}

impl IdentityCache {
    pub fn new(xapi: Arc<dyn Xapi>, flags: IdentityFlags) -> Self {
        IdentityCache {
            xapi,
            flags,
            snapshot: Arc::new(RwLock::new(IdentitySnapshot::new())),
            watching: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reads every enabled identity field and replaces the cached snapshot with the result.
    /// A field whose read fails is left out.
    pub async fn refresh_identity(&self) -> IdentitySnapshot {
        let mut fresh = IdentitySnapshot::new();
        for field in IdentityField::ALL {
            if !self.flags.enabled(field) {
                continue;
            }
            match self.xapi.get(&Path::new(field.path())).await {
                Ok(value) => match render(value) {
                    Some(value) => {
                        fresh.insert(field.name().to_string(), value);
                    }
                    None => debug!("Identity field {} has no value", field.name()),
                },
                Err(e) => error!("Failed to read identity field {}: {e}", field.name()),
            }
        }

        debug!("Refreshed identity with {} fields", fresh.len());
        *self.snapshot.write().await = fresh.clone();
        fresh
    }

    /// Current cached snapshot. Empty until the first refresh.
    pub async fn snapshot(&self) -> IdentitySnapshot {
        self.snapshot.read().await.clone()
    }

    /// Refreshes the snapshot whenever the network status changes. Only registers when a field
    /// read from `Status/Network` is enabled, and only once per cache.
    pub async fn watch_network(&self) -> Result<Option<SubscriptionId>, XapiError> {
        if !IdentityField::ALL
            .iter()
            .any(|field| field.is_network() && self.flags.enabled(*field))
        {
            return Ok(None);
        }
        if self.watching.swap(true, Ordering::SeqCst) {
            debug!("Network watch already registered");
            return Ok(None);
        }

        let handle = Handle::current();
        let cache = self.clone();
        let handler: FeedbackHandler = Arc::new(move |_value: Value| {
            let cache = cache.clone();
            handle.spawn(async move {
                debug!("Network status changed, refreshing identity");
                cache.refresh_identity().await;
            });
        });

        match self.xapi.on(&Path::new(NETWORK_PATH), handler).await {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                warn!("Failed to watch {NETWORK_PATH}: {e}");
                self.watching.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}
