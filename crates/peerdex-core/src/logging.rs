//! Tracing subscriber setup.

use std::sync::Once;

use peerdex_config::components::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over the
/// configured level. Later calls are no-ops, so tests may call it freely.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.level));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.with_target);

        // Another subscriber may already be installed by the host process
        let _ = match config.format {
            LogFormat::Text => builder.try_init(),
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
    });
}
