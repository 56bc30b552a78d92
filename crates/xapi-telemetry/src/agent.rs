// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xapi_client::Xapi;

use crate::applier::apply_configuration;
use crate::config::{Config, Delivery};
use crate::dispatcher::Dispatcher;
use crate::error::DeliveryError;
use crate::identity::IdentityCache;
use crate::scheduler::Scheduler;
use crate::status::StatusAggregator;
use crate::subscriptions::SubscriptionManager;
use crate::transport::{ReqwestTransport, Transport, XapiHttpTransport};

/// Startup progress of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Waiting for the device to settle.
    Booting,
    /// Writing device configuration.
    ApplyingConfig,
    /// Reading identity fields.
    FetchingIdentity,
    /// Listeners registered, telemetry is flowing.
    Subscribed,
}

/// Wires the components together and drives them through startup.
pub struct TelemetryAgent {
    config: Arc<Config>,
    xapi: Arc<dyn Xapi>,
    transport: Arc<dyn Transport>,
    state: watch::Sender<AgentState>,
}

impl TelemetryAgent {
    pub fn new(config: Arc<Config>, xapi: Arc<dyn Xapi>, transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(AgentState::Booting);
        TelemetryAgent {
            config,
            xapi,
            transport,
            state,
        }
    }

    /// Picks the transport named by `delivery`.
    pub fn from_config(config: Arc<Config>, xapi: Arc<dyn Xapi>) -> Result<Self, DeliveryError> {
        let transport: Arc<dyn Transport> = match config.delivery {
            Delivery::Xapi => Arc::new(XapiHttpTransport::new(Arc::clone(&xapi))),
            Delivery::Direct => Arc::new(ReqwestTransport::new(config.request_timeout)?),
        };
        Ok(Self::new(config, xapi, transport))
    }

    pub fn state(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    fn transition(&self, state: AgentState) {
        debug!("Agent state: {state:?}");
        self.state.send_replace(state);
    }

    /// Runs startup and then sends telemetry until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        self.transition(AgentState::Booting);
        if self.config.access_token.is_empty() {
            warn!("accessToken is empty, payloads will be sent with an empty bearer token");
        }
        if !self.config.startup_delay.is_zero() {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(self.config.startup_delay) => {}
            }
        }

        self.transition(AgentState::ApplyingConfig);
        apply_configuration(&self.xapi, &self.config.sensors.device).await;

        self.transition(AgentState::FetchingIdentity);
        let identity = IdentityCache::new(Arc::clone(&self.xapi), self.config.id.clone());
        identity.refresh_identity().await;
        // failure is logged by the cache, the snapshot just stops following network changes
        let _ = identity.watch_network().await;

        let status = StatusAggregator::new(
            Arc::clone(&self.xapi),
            self.config.sensors.device.clone(),
            self.config.sensors.peripherals.clone(),
            self.config.status.clone(),
        );
        let dispatcher = Dispatcher::new(
            identity,
            status,
            Arc::clone(&self.transport),
            self.config.telemetry_server.clone(),
            self.config.access_token.clone(),
        );

        let subscriptions = SubscriptionManager::new(
            Arc::clone(&self.xapi),
            dispatcher.clone(),
            self.config.status.clone(),
            self.config.event.clone(),
        )
        .subscribe_to_changes()
        .await;
        info!("Subscribed to {} status changes and events", subscriptions.len());
        self.transition(AgentState::Subscribed);

        Scheduler::new(dispatcher, self.config.interval)
            .run(cancel)
            .await;
        info!("Telemetry agent stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tracing_test::traced_test;
    use xapi_client::memory::MemoryXapi;
    use xapi_client::Path;

    fn config(yaml: &str) -> Arc<Config> {
        Arc::new(Config::from_yaml_str(yaml).unwrap())
    }

    #[tokio::test]
    async fn test_from_config_picks_transport() {
        let xapi: Arc<dyn Xapi> = Arc::new(MemoryXapi::default());
        let direct = config("telemetryServer: https://collector.example.com\ndelivery: direct");
        assert!(TelemetryAgent::from_config(direct, Arc::clone(&xapi)).is_ok());

        let device = config("telemetryServer: https://collector.example.com");
        assert!(TelemetryAgent::from_config(device, xapi).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reaches_subscribed_and_stops() {
        let xapi = MemoryXapi::new(json!({
            "Status": { "SystemUnit": { "State": { "NumberOfActiveCalls": 0 } } }
        }));
        let agent = TelemetryAgent::from_config(
            config(
                r#"
telemetryServer: https://collector.example.com
intervalTime: 60000
status:
  NumberOfActiveCalls: true
"#,
            ),
            Arc::new(xapi.clone()),
        )
        .unwrap();
        let mut state = agent.state();
        assert_eq!(*state.borrow(), AgentState::Booting);

        let cancel = CancellationToken::new();
        let agent = Arc::new(agent);
        let run = {
            let agent = Arc::clone(&agent);
            let cancel = cancel.clone();
            tokio::spawn(async move { agent.run(cancel).await })
        };

        state
            .wait_for(|state| *state == AgentState::Subscribed)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            xapi.subscriptions(),
            vec![Path::new("Status/SystemUnit/State/NumberOfActiveCalls")]
        );
        let posts = xapi
            .commands()
            .into_iter()
            .filter(|(path, _)| *path == Path::new("Command/HttpClient/Post"))
            .count();
        assert_eq!(posts, 1);

        cancel.cancel();
        run.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_startup_delay() {
        let xapi = MemoryXapi::default();
        let agent = TelemetryAgent::from_config(
            config("telemetryServer: https://collector.example.com\nstartupDelay: 60000"),
            Arc::new(xapi.clone()),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        agent.run(cancel).await;
        assert!(xapi.writes().is_empty());
        assert_eq!(*agent.state().borrow(), AgentState::Booting);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_empty_access_token_is_logged() {
        let agent = TelemetryAgent::from_config(
            config("telemetryServer: https://collector.example.com\nstartupDelay: 60000"),
            Arc::new(MemoryXapi::default()),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        agent.run(cancel).await;
        assert!(logs_contain("accessToken is empty"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_access_token_set_is_not_logged() {
        let agent = TelemetryAgent::from_config(
            config(
                "telemetryServer: https://collector.example.com\naccessToken: secret\nstartupDelay: 60000",
            ),
            Arc::new(MemoryXapi::default()),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        agent.run(cancel).await;
        assert!(!logs_contain("accessToken is empty"));
    }
}
