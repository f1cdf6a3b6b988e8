use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize structured logging for Motorway.
///
/// `RUST_LOG`, when set, takes precedence over the configured level.
/// Installing a second subscriber is an error.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let env_filter = build_filter(&logging.level, std::env::var("RUST_LOG").ok())?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    match logging.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt_layer
                    .json()
                    .with_current_span(false)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .try_init(),
    }
    .wrap_err("Failed to install tracing subscriber")?;

    tracing::info!(
        level = %logging.level,
        format = ?logging.format,
        "Motorway logging initialized"
    );
    Ok(())
}

fn build_filter(level: &str, env_override: Option<String>) -> Result<EnvFilter> {
    match env_override.filter(|directive| !directive.trim().is_empty()) {
        Some(directive) => EnvFilter::try_new(&directive)
            .wrap_err_with(|| format!("Invalid RUST_LOG directive: {directive}")),
        None => EnvFilter::try_new(level).wrap_err_with(|| format!("Invalid log level: {level}")),
    }
}

/// Create a request-scoped tracing span
pub fn create_request_span(method: &str, path: &str, request_id: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        http.method = method,
        http.path = path,
        request.id = request_id,
        http.status_code = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    )
}

/// Create a span for one outbound backend call
pub fn create_backend_span(backend_url: &str, method: &str, path: &str) -> tracing::Span {
    tracing::info_span!(
        "backend_request",
        backend.url = backend_url,
        http.method = method,
        http.path = path,
        http.status_code = tracing::field::Empty,
    )
}
