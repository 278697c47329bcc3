//! Logging bootstrap.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber from `log.level` and
/// `log.format`. `RUST_LOG` overrides the configured level.
pub fn init(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
