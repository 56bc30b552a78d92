// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, error, info};
use xapi_client::{FeedbackHandler, Path, SubscriptionId, Xapi};

use crate::config::flags::{feedback_enabled, EventFlags, StatusFlags};
use crate::dispatcher::{Dispatcher, TelemetryEvent};

/// Status changes and events that trigger an immediate dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feedback {
    NumberOfActiveCalls,
    PeoplePresence,
    PeopleCountCurrent,
    BootEvent,
    PresentationStarted,
    PresentationStopped,
}

impl Feedback {
    pub const ALL: [Feedback; 6] = [
        Feedback::NumberOfActiveCalls,
        Feedback::PeoplePresence,
        Feedback::PeopleCountCurrent,
        Feedback::BootEvent,
        Feedback::PresentationStarted,
        Feedback::PresentationStopped,
    ];

    /// Key of the event value in the payload
    pub fn name(self) -> &'static str {
        match self {
            Feedback::NumberOfActiveCalls => "NumberOfActiveCalls",
            Feedback::PeoplePresence => "PeoplePresence",
            Feedback::PeopleCountCurrent => "PeopleCountCurrent",
            Feedback::BootEvent => "BootEvent",
            Feedback::PresentationStarted => "PresentationStarted",
            Feedback::PresentationStopped => "PresentationStopped",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Feedback::NumberOfActiveCalls => "Status/SystemUnit/State/NumberOfActiveCalls",
            Feedback::PeoplePresence => "Status/RoomAnalytics/PeoplePresence",
            Feedback::PeopleCountCurrent => "Status/RoomAnalytics/PeopleCount/Current",
            Feedback::BootEvent => "Event/BootEvent",
            Feedback::PresentationStarted => "Event/PresentationStarted",
            Feedback::PresentationStopped => "Event/PresentationStopped",
        }
    }
}

/// Registered feedback, by event name
pub type Subscriptions = BTreeMap<String, SubscriptionId>;

pub struct SubscriptionManager {
    xapi: Arc<dyn Xapi>,
    dispatcher: Dispatcher,
    status: StatusFlags,
    event: EventFlags,
}

impl SubscriptionManager {
    pub fn new(
        xapi: Arc<dyn Xapi>,
        dispatcher: Dispatcher,
        status: StatusFlags,
        event: EventFlags,
    ) -> Self {
        SubscriptionManager {
            xapi,
            dispatcher,
            status,
            event,
        }
    }

    fn handler(&self, feedback: Feedback, runtime: Handle) -> FeedbackHandler {
        let dispatcher = self.dispatcher.clone();
        Arc::new(move |value: Value| {
            debug!("Received {}", feedback.name());
            let dispatcher = dispatcher.clone();
            runtime.spawn(async move {
                // outcome is logged by the dispatcher
                let _ = dispatcher
                    .dispatch(Some(TelemetryEvent::new(feedback.name(), value)))
                    .await;
            });
        })
    }

    /// Registers one listener per enabled status or event. Every firing sends its own payload
    /// carrying the new value. A failed registration is logged and the others still proceed.
    pub async fn subscribe_to_changes(&self) -> Subscriptions {
        info!("Subscribing to status changes and events");
        let runtime = Handle::current();
        let mut subscriptions = Subscriptions::new();

        for feedback in Feedback::ALL {
            if !feedback_enabled(&self.status, &self.event, feedback) {
                continue;
            }
            let handler = self.handler(feedback, runtime.clone());
            match self.xapi.on(&Path::new(feedback.path()), handler).await {
                Ok(id) => {
                    debug!("Subscribed to {} as {id}", feedback.path());
                    subscriptions.insert(feedback.name().to_string(), id);
                }
                Err(e) => error!("Failed to subscribe to {}: {e}", feedback.path()),
            }
        }
        subscriptions
    }
}
