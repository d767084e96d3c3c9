//! Structured logging setup.
//!
//! Log events go to stderr so that `--json` output on stdout stays
//! machine-readable. `RUST_LOG` takes precedence over `[logging] level`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    }
}
