//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and the metrics exporter
//!
//! # Design Decisions
//! - Fail fast: an unreadable or invalid config file is fatal
//! - No config file means defaults

use std::net::SocketAddr;
use std::path::Path;

use crate::config::{load_config, AppConfig, ConfigError};
use crate::observability::{logging, metrics};

/// Config from `path`, or defaults when none is given.
pub fn load_startup_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => Ok(AppConfig::default()),
    }
}

/// Logging first, so metrics failures are visible.
pub fn init_observability(config: &AppConfig) {
    logging::init_logging(&config.observability);

    if !config.observability.metrics_enabled {
        return;
    }
    match config.observability.metrics_address.parse::<SocketAddr>() {
        Ok(address) => metrics::init_metrics(address),
        Err(error) => tracing::error!(
            metrics_address = %config.observability.metrics_address,
            error = %error,
            "Failed to parse metrics address"
        ),
    }
}
