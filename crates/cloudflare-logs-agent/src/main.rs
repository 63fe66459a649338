// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;

use cloudflare_logs_core::{
    Auth, CloudflareClient, FileCheckpointStore, LogPoller, PollerConfig,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
pub async fn main() {
    let log_level = env::var("CF_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

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
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match PollerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Error creating config on poller startup: {err}");
            return;
        }
    };

    let host = env::var("CF_HOST")
        .or_else(|_| env::var("HOSTNAME"))
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string());

    let auth = Auth {
        email: config.auth_email.clone(),
        key: config.auth_key.clone(),
    };
    let client = match CloudflareClient::new(&config.api_url, &auth) {
        Ok(client) => client,
        Err(err) => {
            error!("Error creating Cloudflare client: {err}");
            return;
        }
    };
    let store = FileCheckpointStore::new(&config.checkpoint_path);

    let (events_tx, mut events_rx) = mpsc::channel(1024);
    let shutdown = CancellationToken::new();

    // Downstream sink: one JSON line per event on stdout.
    let sink = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => error!("Failed to serialize event: {err}"),
            }
        }
    });

    let poller = LogPoller::new(client, store, config, host, events_tx);
    let poller_token = shutdown.clone();
    let mut worker = tokio::spawn(async move { poller.run(poller_token).await });

    let mut failed = false;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping poller");
            shutdown.cancel();
            match (&mut worker).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!("Poller terminated with error during shutdown: {err}");
                    failed = true;
                }
                Err(err) => {
                    error!("Poller task failed during shutdown: {err}");
                    failed = true;
                }
            }
        }
        result = &mut worker => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!("Poller terminated with error: {err}");
                    failed = true;
                }
                Err(err) => {
                    error!("Poller task panicked: {err}");
                    failed = true;
                }
            }
        }
    }

    // The poller owns the only sender; once it is gone the sink drains.
    let _ = sink.await;
    if failed {
        std::process::exit(1);
    }
}
