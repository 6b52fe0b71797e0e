// Tracing setup: stderr fmt output behind a reloadable level filter.
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

type FilterHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Install the global subscriber using the configured level.
///
/// `RUST_LOG` wins over the configured level when it holds a valid filter.
/// Calling this more than once keeps the first subscriber.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(&config.level));

    let (filter_layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// Swap the active filter, e.g. when `--verbose` is passed after startup.
pub fn set_level(level: &str) -> Result<(), String> {
    let filter = EnvFilter::try_new(level).map_err(|e| format!("invalid log filter '{level}': {e}"))?;
    match FILTER_HANDLE.get() {
        Some(handle) => handle
            .modify(|current| *current = filter)
            .map_err(|e| format!("failed to reload log filter: {e}")),
        None => Err("tracing not initialized".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_filter() {
        assert!(set_level("vitis_cache=loud").is_err());
    }
}
