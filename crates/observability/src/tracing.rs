//! Tracing/logging initialization.
//!
//! Ledger writes log one event per accepted change and a warning per stock
//! rejection; spans carry the product, locations and movement id.

use tracing_subscriber::EnvFilter;

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, with timestamps.
    #[default]
    Json,
    /// Human-readable lines.
    Pretty,
}

/// Initialize tracing with the filter from `RUST_LOG`, falling back to `info`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    install(filter, LogFormat::Json);
}

/// Initialize tracing with an explicit filter directive such as
/// `"stockflow_infra=debug,info"`.
///
/// `RUST_LOG` still wins when set. An unparsable directive falls back to
/// `info`. Returns `false` if a global subscriber was already installed.
pub fn init_with(directive: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    install(filter, format)
}

fn install(filter: EnvFilter, format: LogFormat) -> bool {
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match format {
        LogFormat::Json => builder
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .try_init()
            .is_ok(),
        LogFormat::Pretty => builder.try_init().is_ok(),
    }
}
