//! # docqa-telemetry
//!
//! Logging setup for docqa binaries and an in-memory span capture layer for tests.
//!
//! The library crates only emit `tracing` spans and events (`rag.index`,
//! `rag.retrieve`, `rag.answer`). Installing a subscriber is left to the
//! binary, through one of the `init_*` functions here. The filter comes from
//! `RUST_LOG` when set and falls back to `info`.
//!
//! ```rust,ignore
//! docqa_telemetry::init_telemetry("docqa")?;
//! ```

pub mod capture;

pub use capture::{SpanCaptureLayer, SpanRecord, SpanStore};

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Build the log filter from `RUST_LOG`, or from `default` when it is unset or invalid.
pub fn env_filter(default: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(default).map_err(|e| TelemetryError::InvalidFilter {
            filter: default.to_string(),
            message: e.to_string(),
        })
    })
}

/// Install human-readable logging to stderr.
///
/// # Errors
///
/// Returns [`TelemetryError::AlreadyInitialized`] if a global subscriber is
/// already set, e.g. on a second call.
pub fn init_telemetry(service_name: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER)?)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;
    tracing::debug!(service.name = service_name, "telemetry initialized");
    Ok(())
}

/// Install newline-delimited JSON logging to stderr, one object per event
/// with the enclosing span list attached.
pub fn init_json(service_name: &str) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER)?)
        .with(fmt::layer().json().with_span_list(true).with_writer(std::io::stderr))
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;
    tracing::debug!(service.name = service_name, "telemetry initialized");
    Ok(())
}

/// Install stderr logging plus a [`SpanCaptureLayer`] writing into `store`.
pub fn init_with_capture(service_name: &str, store: SpanStore) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER)?)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(SpanCaptureLayer::new(store))
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;
    tracing::debug!(service.name = service_name, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::error_span;

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
        assert!(env_filter("docqa_rag=debug,warn").is_ok());
    }

    // The only test in this binary that touches the global subscriber.
    #[tokio::test]
    async fn global_subscriber_installs_once() {
        let store = SpanStore::new();
        init_with_capture("docqa-test", store.clone()).unwrap();

        {
            let _span = error_span!("rag.index", document_count = 2_u64).entered();
        }
        assert_eq!(store.named("rag.index").len(), 1);

        assert!(matches!(init_telemetry("docqa-test"), Err(TelemetryError::AlreadyInitialized)));
        assert!(matches!(init_json("docqa-test"), Err(TelemetryError::AlreadyInitialized)));
    }
}
