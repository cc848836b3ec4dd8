//! A config-driven voltage logger for MCP3424 and USB-1608G converters.

pub mod config;
pub mod logger;
pub mod scaling;
pub mod sim;

use tracing_subscriber::EnvFilter;

/// Installs the `tracing` subscriber. `RUST_LOG` takes precedence over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
