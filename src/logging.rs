//! Tracing setup for the console binary.
//!
//! Stdout carries command output, so log lines go to stderr unless a log
//! directory is configured. Spans are exported over OTLP only when
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use opentelemetry::trace::{TraceError, TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{Config as TraceConfig, TracerProvider};
use opentelemetry_semantic_conventions::resource as semconv;
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "admin-console";
const LOG_FILE_NAME: &str = "admin-console.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Stdout,
    Stderr,
    /// Daily-rotated files under this directory.
    Dir(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub sink: LogSink,
    pub environment: String,
    pub otlp_endpoint: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads `LOG_FORMAT`, `LOG_OUTPUT`, `LOG_DIR`, `ENVIRONMENT` and
    /// `OTEL_EXPORTER_OTLP_ENDPOINT` through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = lookup("ENVIRONMENT")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "development".to_string());

        let format = match lookup("LOG_FORMAT").map(|v| v.to_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            _ if is_production(&environment) => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let log_dir = lookup("LOG_DIR").map(PathBuf::from);
        let sink = match lookup("LOG_OUTPUT").map(|v| v.to_lowercase()).as_deref() {
            Some("stdout") => LogSink::Stdout,
            Some("stderr") => LogSink::Stderr,
            Some("file") => LogSink::Dir(log_dir.unwrap_or_else(|| PathBuf::from("logs"))),
            _ => log_dir.map_or(LogSink::Stderr, LogSink::Dir),
        };

        Self {
            format,
            sink,
            environment,
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
                .filter(|value| !value.trim().is_empty()),
        }
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn default_directives(&self) -> &'static str {
        if is_production(&self.environment) {
            "info,hyper=warn,reqwest=warn"
        } else {
            "warn,admin_console=debug"
        }
    }

    fn resource(&self) -> Resource {
        Resource::new(vec![
            KeyValue::new(semconv::SERVICE_NAME, SERVICE_NAME),
            KeyValue::new(semconv::SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            KeyValue::new("environment", self.environment.clone()),
        ])
    }
}

fn is_production(environment: &str) -> bool {
    matches!(environment, "production" | "prod")
}

/// Installs the global subscriber.
///
/// Hold the returned guard until exit; dropping it flushes buffered lines.
pub fn init_logging(config: LoggingConfig) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let (writer, guard) = match &config.sink {
        LogSink::Stdout => tracing_appender::non_blocking(io::stdout()),
        LogSink::Stderr => tracing_appender::non_blocking(io::stderr()),
        LogSink::Dir(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_NAME))
        }
    };

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(false)
            .with_ansi(config.sink == LogSink::Stderr)
            .boxed(),
    };

    let otel_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => match tracer_provider(endpoint, config.resource()) {
            Ok(provider) => {
                let tracer = provider.tracer(SERVICE_NAME);
                opentelemetry::global::set_tracer_provider(provider);
                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            }
            Err(error) => {
                eprintln!("warning: trace export disabled, OTLP exporter failed: {error}");
                None
            }
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .context("installing the tracing subscriber")?;

    tracing::debug!(
        environment = %config.environment,
        format = ?config.format,
        sink = ?config.sink,
        otlp = config.otlp_endpoint.is_some(),
        "logging initialized"
    );
    Ok(guard)
}

fn tracer_provider(endpoint: &str, resource: Resource) -> Result<TracerProvider, TraceError> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(TraceConfig::default().with_resource(resource))
        .install_batch(opentelemetry_sdk::runtime::Tokio)
}

/// Flushes pending spans. A no-op when export was never enabled.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}

/// Span wrapping one CLI command.
pub fn command_span(command: &'static str) -> tracing::Span {
    tracing::info_span!("command", command, version = env!("CARGO_PKG_VERSION"))
}
