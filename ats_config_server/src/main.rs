// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use ats_config::api::Server;
use ats_config::store::{AlwaysErrorsStore, ArcStore, MemoryStore, MetricsMonitoredStore};
use ats_config::ConfigEngine;
use clap::{Arg, Command};
use service_util::infra::{setup_infra_endpoints, shutdown_signal};
use service_util::logging::setup_logging;
use service_util::sentry::setup_sentry;

use crate::config::{Config, StoreConfig};

mod config;
mod refresh;

const SERVICE_NAME: &str = "ats_config_server";

async fn make_store(config: StoreConfig) -> Result<ArcStore, String> {
    let store: ArcStore = match config {
        StoreConfig::Memory(memory_config) => {
            let last_modified = refresh::snapshot_modified(&memory_config.snapshot_path).await?;
            let snapshot = refresh::read_snapshot(&memory_config.snapshot_path).await?;
            let store = MemoryStore::new(snapshot);

            match memory_config.refresh_frequency_s {
                Some(refresh_frequency_s) if refresh_frequency_s > 0 => {
                    log::info!(
                        "Checking {} for changes every {refresh_frequency_s}s",
                        memory_config.snapshot_path
                    );
                    tokio::spawn(refresh::refresh_snapshot(
                        store.clone(),
                        memory_config.snapshot_path,
                        refresh_frequency_s,
                        last_modified,
                    ));
                }
                _ => log::warn!("Snapshot refresh disabled because it was not configured"),
            }

            Arc::new(MetricsMonitoredStore::new(store, "memory"))
        }
        StoreConfig::AlwaysErrors => {
            log::warn!("Using the always_errors store: every request will fail");
            Arc::new(MetricsMonitoredStore::new(AlwaysErrorsStore, "always_errors"))
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new(SERVICE_NAME)
        .arg(
            Arg::new("config")
                .short('c')
                .required(true)
                .value_name("FILE"),
        )
        .get_matches();

    let config = {
        let filename = matches
            .get_one::<String>("config")
            .ok_or("Missing config file argument")?;
        let config_content = tokio::fs::read_to_string(filename)
            .await
            .map_err(|err| format!("Failed to read config from {filename}: {err}"))?;
        Config::from_str(&config_content)?
    };

    setup_logging(config.infra.as_ref(), SERVICE_NAME)?;
    log::info!("{SERVICE_NAME} config: {config:?}");
    let _sentry_guard = setup_sentry(config.infra.as_ref(), SERVICE_NAME)?;

    let address: SocketAddr = config
        .listen_address
        .parse()
        .map_err(|err| format!("Failed to parse listen address: {err}"))?;

    let store = make_store(config.store).await?;
    let server = Server::new(ConfigEngine::with_system_clock(store));

    let shutdown_receiver = setup_infra_endpoints(config.infra.unwrap_or_default(), || {})?;

    let (bound_address, serve_fut) = warp::serve(server.into_filter())
        .try_bind_with_graceful_shutdown(address, shutdown_signal(shutdown_receiver))
        .map_err(|err| format!("Failed to bind {address}: {err}"))?;
    log::info!("Serving config files on {bound_address}");

    serve_fut.await;
    log::info!("Shut down cleanly");
    Ok(())
}
