//! Tracing setup for native marginalia binaries.
//!
//! ```ignore
//! use marginalia_common::telemetry::{self, TelemetryConfig};
//!
//! telemetry::init(TelemetryConfig::from_env("marginalia-cli"));
//! tracing::info!("started");
//! ```

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Settings for [`init`].
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name recorded on startup (e.g. "marginalia-cli")
    pub service_name: String,
    /// Level used when `RUST_LOG` is unset (DEBUG in debug builds, else INFO)
    pub console_level: Level,
}

impl TelemetryConfig {
    /// Build-profile defaults for `service_name`.
    ///
    /// `RUST_LOG` overrides `console_level` when set.
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };
        Self {
            service_name: service_name.into(),
            console_level,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.console_level = level;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.console_level.as_str().to_lowercase()))
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: TelemetryConfig) {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(config.filter());

    if tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok()
    {
        tracing::debug!(service = %config.service_name, "telemetry initialized");
    }
}
