use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING: OnceLock<()> = OnceLock::new();

/// Install the stderr subscriber once. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing_once(default_filter: &str, json: bool) {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true);
        let _ = if json { builder.json().try_init() } else { builder.compact().try_init() };
        tracing::debug!(json, "tracing initialized");
    });
}
