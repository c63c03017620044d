// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use opentelemetry::sdk::trace::Sampler;
use opentelemetry_otlp::WithExportConfig;
use tracing::Subscriber;
use tracing_subscriber::filter::targets::Targets;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::infra::{InfraConfig, LogFormat, TracingConfig};

/// Configure logging for a binary.
///
/// `log` records emitted by library crates are forwarded into the same subscriber.
pub fn setup_logging(
    config: Option<&InfraConfig>,
    service_name: &'static str,
) -> Result<(), String> {
    // `EnvFilter` would filter globally, including the OpenTelemetry layer.
    let directive = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned());
    let filter_layer = directive
        .parse::<Targets>()
        .map_err(|err| format!("Failed to parse RUST_LOG: {err}"))?;

    let fmt_layer = match config.map(|c| c.log_format).unwrap_or_default() {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_filter(filter_layer)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_filter(filter_layer)
            .boxed(),
    };

    let opentelemetry_layer_opt = config
        .and_then(|c| c.tracing.as_ref())
        .map(|tc| opentelemetry_layer(tc, service_name))
        .transpose()?;

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(opentelemetry_layer_opt)
        .try_init()
        .map_err(|err| format!("Failed to install tracing subscriber: {err}"))
}

fn opentelemetry_layer<S>(
    tc: &TracingConfig,
    service_name: &'static str,
) -> Result<impl Layer<S>, String>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    if !(0.0..=1.0).contains(&tc.sampling_probability) {
        return Err(format!(
            "sampling_probability must be in range [0.0, 1.0] but was {}",
            tc.sampling_probability
        ));
    }

    let otlp_exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&tc.otel_agent);
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(otlp_exporter)
        .with_trace_config(
            opentelemetry::sdk::trace::config()
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                    tc.sampling_probability,
                ))))
                .with_resource(opentelemetry::sdk::Resource::new(vec![
                    opentelemetry::KeyValue::new("service.name", service_name),
                ])),
        )
        .install_batch(opentelemetry::runtime::Tokio)
        .map_err(|err| format!("Failed to set up OpenTelemetry OTLP: {err}"))?;

    // Only spans that opt in with an `opentelemetry` field are exported.
    let filter_layer = tracing_subscriber::filter::FilterFn::new(|metadata| {
        metadata.fields().field("opentelemetry").is_some()
    });

    Ok(tracing_opentelemetry::layer()
        .with_tracer(tracer)
        .with_filter(filter_layer))
}
