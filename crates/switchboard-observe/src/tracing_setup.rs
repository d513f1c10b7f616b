//! Tracing subscriber initialization with optional OpenTelemetry export.
//!
//! # Usage
//!
//! ```no_run
//! use switchboard_observe::tracing_setup::{LogLevel, init_tracing, resolve_filter};
//!
//! let filter = resolve_filter(std::env::var("RUST_LOG").ok().as_deref(), LogLevel::Default, None);
//! init_tracing(&filter, false).unwrap();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when nothing else asks for more output.
pub const DEFAULT_FILTER: &str = "warn";

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Verbosity requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Errors only, regardless of config.
    Quiet,
    /// No flag given; defer to config.
    Default,
    /// `-v`
    Verbose,
    /// `-vv` or more
    Trace,
}

impl LogLevel {
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => LogLevel::Quiet,
            (false, 0) => LogLevel::Default,
            (false, 1) => LogLevel::Verbose,
            (false, _) => LogLevel::Trace,
        }
    }
}

/// Pick the filter directive: `RUST_LOG`, then CLI verbosity, then the
/// config's `log_level`, then [`DEFAULT_FILTER`].
pub fn resolve_filter(env: Option<&str>, level: LogLevel, config_level: Option<&str>) -> String {
    if let Some(env) = env.filter(|s| !s.trim().is_empty()) {
        return env.to_string();
    }
    match level {
        LogLevel::Quiet => "error".to_string(),
        LogLevel::Verbose => "info,switchboard=debug".to_string(),
        LogLevel::Trace => "trace".to_string(),
        LogLevel::Default => config_level
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_FILTER)
            .to_string(),
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr so they never interleave with console bus output on
/// stdout. With `enable_otel`, spans are also bridged to OpenTelemetry via a
/// stdout exporter.
///
/// # Errors
///
/// Returns an error if `filter` is not a valid directive or a global
/// subscriber is already installed.
pub fn init_tracing(filter: &str, enable_otel: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_new(filter)?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    if enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("switchboard");
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Flush pending spans and shut down the tracer provider. No-op when
/// OpenTelemetry was not enabled.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("warning: tracer provider shutdown failed: {e}");
        }
    }
}
