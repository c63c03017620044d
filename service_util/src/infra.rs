// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::net::SocketAddr;

use futures::FutureExt;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use tokio::runtime::Builder;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use warp::Filter;

/// Prometheus histogram buckets, tuned for requests served from within one data center.
const DEFAULT_PROMETHEUS_BUCKETS: &[f64] = &[
    0.0005, // 0.5 ms
    0.001,  // 1 ms
    0.002,  // 2 ms
    0.005,  // 5 ms
    0.010,  // 10 ms
    0.025,  // 25 ms
    0.050,  // 50 ms
    0.100,  // 100 ms
    0.250,  // 250 ms
    0.5,    // 500 ms
    1.0,    // 1 sec
    2.5,    // 2.5 secs
    5.0,    // 5 secs
    10.0,   // 10 secs
];

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Admin endpoints and observability configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct InfraConfig {
    /// Bind address for the metricsz endpoint.
    #[serde(default = "default_metricsz_bind_addr")]
    pub metricsz_bind_addr: String,

    /// Bind address for the other infra endpoints.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    pub sentry_dsn: Option<String>,

    #[serde(default)]
    pub log_format: LogFormat,

    pub tracing: Option<TracingConfig>,
}

impl Default for InfraConfig {
    fn default() -> Self {
        InfraConfig {
            metricsz_bind_addr: default_metricsz_bind_addr(),
            bind_addr: default_bind_addr(),
            sentry_dsn: None,
            log_format: LogFormat::default(),
            tracing: None,
        }
    }
}

/// Tracing configuration
#[derive(Clone, Debug, Deserialize)]
pub struct TracingConfig {
    /// OpenTelemetry agent endpoint, e.g. `http://otel_collector:4317`
    pub otel_agent: String,

    /// Sampling probability used by the OpenTelemetry subscriber, from 0.0 to 1.0.
    pub sampling_probability: f64,
}

fn default_metricsz_bind_addr() -> String {
    "0.0.0.0:8010".to_owned()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_owned()
}

fn setup_metrics_handler() -> Result<PrometheusHandle, String> {
    let recorder = PrometheusBuilder::new()
        .set_buckets(DEFAULT_PROMETHEUS_BUCKETS)
        .map_err(|err| format!("Failed to set histogram buckets: {err}"))?
        .build_recorder();
    let handle = recorder.handle();
    metrics::set_boxed_recorder(Box::new(recorder))
        .map_err(|err| format!("Failed to install Prometheus metrics recorder: {err}"))?;
    Ok(handle)
}

/// Start the `/healthz` and `/metricsz` endpoints on a dedicated admin thread.
///
/// Returns a `watch` receiver whose `changed()` fails once SIGINT or SIGTERM is received. All
/// servers of the binary should shut down when that happens.
pub fn setup_infra_endpoints(
    config: InfraConfig,
    run_before_metrics_collection: impl Fn() + Clone + Send + Sync + 'static,
) -> Result<watch::Receiver<()>, String> {
    let metrics_handle = setup_metrics_handler()?;

    let metricsz_bind_addr: SocketAddr = config
        .metricsz_bind_addr
        .parse()
        .map_err(|err| format!("Failed to parse metricsz bind address: {err}"))?;

    let bind_addr: SocketAddr = config
        .bind_addr
        .parse()
        .map_err(|err| format!("Failed to parse infra bind address: {err}"))?;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .thread_name("admin")
        .build()
        .map_err(|err| format!("Failed to initialize admin event loop: {err}"))?;

    let (shutdown_sender, shutdown_receiver) = watch::channel(());

    std::thread::Builder::new()
        .name("admin".to_owned())
        .spawn(move || {
            runtime.block_on(async move {
                let signals = signal(SignalKind::interrupt())
                    .and_then(|sigint| Ok((sigint, signal(SignalKind::terminate())?)));
                match signals {
                    Ok((mut sigint_stream, mut sigterm_stream)) => {
                        tokio::spawn(async move {
                            futures::future::select(
                                sigint_stream.recv().boxed(),
                                sigterm_stream.recv().boxed(),
                            )
                            .await;
                            log::info!("Received shutdown signal. Starting graceful shutdown ...");
                            drop(shutdown_sender);
                        });
                    }
                    Err(err) => log::error!("Failed to attach signal handlers: {err}"),
                }

                let healthz = warp::path("healthz").and(warp::get()).map(|| "OK");
                let server_fut = warp::serve(healthz).bind(bind_addr);

                let metrics = warp::path!("metricsz").and(warp::get()).map(move || {
                    run_before_metrics_collection();
                    metrics_handle.render()
                });
                let metrics_fut = warp::serve(metrics).bind(metricsz_bind_addr);

                futures::future::join(server_fut, metrics_fut).await
            });
        })
        .map_err(|err| format!("Failed to spawn admin thread: {err}"))?;

    Ok(shutdown_receiver)
}

/// Resolves once the shutdown signal from `setup_infra_endpoints` fires.
pub async fn shutdown_signal(mut receiver: watch::Receiver<()>) {
    while receiver.changed().await.is_ok() {}
}
