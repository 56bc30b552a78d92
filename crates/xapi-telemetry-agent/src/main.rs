// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::path::PathBuf;
use std::{env, process, sync::Arc};

use anyhow::{anyhow, Context};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use xapi_client::jsonrpc::{ConnectOptions, JsonRpcXapi};
use xapi_telemetry::config::{self, Config, DEFAULT_CONFIG_FILE, DEFAULT_LOG_LEVEL};
use xapi_telemetry::TelemetryAgent;

const ENV_CONFIG_PATH: &str = "XAPI_TELEMETRY_CONFIG";

#[tokio::main]
pub async fn main() {
    let config_path = env::var(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = config::get_config(&config_path);

    let log_level = config
        .as_ref()
        .map(|config| config.log_level.clone())
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,tungstenite=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(
                "Unable to load configuration from {}: {e}",
                config_path.display()
            );
            process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("{e:#}");
        process::exit(1);
    }
}

async fn run(config: Arc<Config>) -> anyhow::Result<()> {
    let url = config
        .device
        .url
        .clone()
        .ok_or_else(|| anyhow!("device.url (or {}) is required", config::env::ENV_DEVICE_URL))?;
    info!("Connecting to device at {url}");

    let xapi = JsonRpcXapi::connect(&ConnectOptions {
        url: url.clone(),
        username: config.device.username.clone(),
        password: config.device.password.clone(),
        verify_tls: config.device.verify_tls,
    })
    .await
    .with_context(|| format!("Unable to connect to device at {url}"))?;

    let disconnected = xapi.disconnected();
    let agent = TelemetryAgent::from_config(Arc::clone(&config), Arc::new(xapi))
        .context("Unable to create telemetry transport")?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    let lost = disconnected.clone();
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => error!("Unable to listen for shutdown signal: {e}"),
            },
            () = lost.cancelled() => error!("Lost connection to device at {url}"),
        }
        shutdown.cancel();
    });

    info!(
        "Forwarding telemetry to {} every {} ms",
        config.telemetry_server,
        config.interval.as_millis()
    );
    agent.run(cancel).await;

    // feedback registrations do not survive the socket
    if disconnected.is_cancelled() {
        return Err(anyhow!("Connection to device closed"));
    }
    Ok(())
}
