use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Instant;

use anyhow::{Context, Result};
use node_plugin::message::LogLevel;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, MetricExporter, Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

const SERVICE_NAME: &str = "chatdata";
const LOG_FILE: &str = "chatdata.log";
const REPORT_FILE: &str = "chatdata-requests.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct LogConfig {
    pub log_level: LogLevel,
    /// Write rolling text logs and JSON request reports here instead of stderr
    pub log_dir: Option<PathBuf>,
    /// OTLP/HTTP endpoint for logs and metrics (e.g. http://localhost:4318)
    pub otel_endpoint: Option<String>,
}

impl LogConfig {
    pub fn new(log_level: LogLevel, log_dir: Option<PathBuf>, otel_endpoint: Option<String>) -> Self {
        Self { log_level, log_dir, otel_endpoint }
    }
}

/// Keeps the exporters alive; flushes them when dropped.
#[derive(Default)]
pub struct TelemetryGuard {
    logger_provider: Option<SdkLoggerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.logger_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush otel logs: {e}");
            }
        }
        if let Some(provider) = self.meter_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush otel metrics: {e}");
            }
        }
    }
}

static RESOURCE: OnceLock<Resource> = OnceLock::new();
fn get_resource() -> Resource {
    RESOURCE
        .get_or_init(|| Resource::builder().with_service_name(SERVICE_NAME).build())
        .clone()
}

fn init_otel_logs(endpoint: &str) -> Result<SdkLoggerProvider> {
    let exporter = LogExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(format!("{}/v1/logs", endpoint.trim_end_matches('/')))
        .build()
        .context("building OTLP log exporter")?;
    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn init_otel_metrics(endpoint: &str) -> Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(format!("{}/v1/metrics", endpoint.trim_end_matches('/')))
        .build()
        .context("building OTLP metric exporter")?;
    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn rolling(dir: &PathBuf, file: &str) -> RollingFileAppender {
    RollingFileAppender::new(Rotation::DAILY, dir, file)
}

/// Install the global subscriber.
///
/// - with `log_dir`: a plain-text rolling log plus a JSON log that only
///   carries `target: "request"` events, one line per API call;
/// - without: human-readable output on stderr, so stdout stays free for data;
/// - with `otel_endpoint`: logs are bridged to OTLP and request metrics are
///   exported periodically.
pub fn init_tracing(config: &LogConfig) -> Result<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_directive()))
        .add_directive("hyper=off".parse()?)
        .add_directive("reqwest=off".parse()?)
        .add_directive("h2=off".parse()?);

    let (txt_layer, json_layer) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log dir {}", dir.display()))?;
            let txt = fmt::layer().with_writer(rolling(dir, LOG_FILE)).with_ansi(false);
            let json = fmt::layer()
                .json()
                .with_writer(rolling(dir, REPORT_FILE))
                .with_target(true)
                .with_filter(EnvFilter::new("request=info"));
            (Some(txt), Some(json))
        }
        None => (None, None),
    };
    let stderr_layer = config
        .log_dir
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    let mut guard = TelemetryGuard::default();
    let otel_layer = match &config.otel_endpoint {
        Some(endpoint) => {
            let logger_provider = init_otel_logs(endpoint)?;
            let meter_provider = init_otel_metrics(endpoint)?;
            global::set_meter_provider(meter_provider.clone());
            let layer = OpenTelemetryTracingBridge::new(&logger_provider);
            guard.logger_provider = Some(logger_provider);
            guard.meter_provider = Some(meter_provider);
            Some(layer)
        }
        None => None,
    };

    Registry::default()
        .with(env_filter)
        .with(txt_layer)
        .with(json_layer)
        .with(stderr_layer)
        .with(otel_layer)
        .try_init()
        .context("a tracing subscriber is already installed")?;

    Ok(guard)
}

struct RequestMetrics {
    started: Counter<u64>,
    succeeded: Counter<u64>,
    failed: Counter<u64>,
    latency_ms: Histogram<f64>,
}

static METRICS: OnceLock<RequestMetrics> = OnceLock::new();

fn metrics() -> &'static RequestMetrics {
    METRICS.get_or_init(|| {
        let meter = global::meter(SERVICE_NAME);
        RequestMetrics {
            started: meter
                .u64_counter("chatdata_requests_started")
                .with_description("Chat Data API requests started")
                .build(),
            succeeded: meter.u64_counter("chatdata_requests_succeeded").build(),
            failed: meter.u64_counter("chatdata_requests_failed").build(),
            latency_ms: meter
                .f64_histogram("chatdata_request_latency_ms")
                .with_description("Latency per Chat Data API request")
                .with_unit("ms")
                .build(),
        }
    })
}

/// Time one API call, count it, and emit a `target: "request"` report line.
pub async fn instrument_request<Fut, T, E>(name: &str, request: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let metrics = metrics();
    metrics.started.add(1, &[]);
    let start = Instant::now();

    let result = request.await;

    let elapsed = start.elapsed().as_secs_f64() * 1_000.0;
    metrics.latency_ms.record(elapsed, &[]);
    match &result {
        Ok(_) => {
            metrics.succeeded.add(1, &[]);
            info!("request `{}` succeeded in {:.1} ms", name, elapsed);
        }
        Err(err) => {
            metrics.failed.add(1, &[]);
            error!(error = %err, "request `{}` failed in {:.1} ms", name, elapsed);
        }
    }

    tracing::event!(
        target: "request",
        tracing::Level::INFO,
        request = name,
        latency_ms = elapsed,
        status = if result.is_ok() { "ok" } else { "error" },
    );

    result
}
