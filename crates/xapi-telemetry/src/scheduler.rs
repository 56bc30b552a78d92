// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dispatcher::Dispatcher;

/// Periodic dispatch. Each tick sends its own payload without waiting for earlier ones.
pub struct Scheduler {
    dispatcher: Dispatcher,
    period: Duration,
}

impl Scheduler {
    pub fn new(dispatcher: Dispatcher, period: Duration) -> Self {
        Scheduler { dispatcher, period }
    }

    /// Dispatches immediately and then once per period until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Sending telemetry every {} ms", self.period.as_millis());
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        let _ = dispatcher.dispatch(None).await;
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::flags::{
        DeviceSensorFlags, IdentityFlags, PeripheralSensorFlags, StatusFlags,
    };
    use crate::error::DeliveryError;
    use crate::identity::IdentityCache;
    use crate::status::StatusAggregator;
    use crate::transport::{OutboundRequest, Transport};
    use async_trait::async_trait;
    use reqwest::Url;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use xapi_client::memory::MemoryXapi;
    use xapi_client::Xapi;

    #[derive(Default)]
    struct CountingTransport(AtomicUsize);

    #[async_trait]
    impl Transport for CountingTransport {
        async fn post(&self, _request: OutboundRequest) -> Result<u16, DeliveryError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(200)
        }
    }

    fn dispatcher(transport: Arc<CountingTransport>) -> Dispatcher {
        let xapi: Arc<dyn Xapi> = Arc::new(MemoryXapi::default());
        Dispatcher::new(
            IdentityCache::new(xapi.clone(), IdentityFlags::default()),
            StatusAggregator::new(
                xapi,
                DeviceSensorFlags::default(),
                PeripheralSensorFlags::default(),
                StatusFlags::default(),
            ),
            transport,
            Url::parse("https://collector.example.com").unwrap(),
            String::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let transport = Arc::new(CountingTransport::default());
        let scheduler = Scheduler::new(dispatcher(transport.clone()), Duration::from_secs(120));
        let cancel = CancellationToken::new();

        let run = {
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.0.load(Ordering::SeqCst), 1);

        cancel.cancel();
        run.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_every_period_until_cancelled() {
        let transport = Arc::new(CountingTransport::default());
        let scheduler = Scheduler::new(dispatcher(transport.clone()), Duration::from_secs(1));
        let cancel = CancellationToken::new();

        let run = {
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(2500)).await;
        cancel.cancel();
        run.await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.0.load(Ordering::SeqCst), 3);
    }
}
