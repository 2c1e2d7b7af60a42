//! Diagnostics go to stderr, filtered by `SHAI_LOG` (tracing `EnvFilter`
//! syntax). The default only lets warnings through, so hooks stay silent in
//! an interactive shell.

use tracing_subscriber::EnvFilter;

const ENV_VAR: &str = "SHAI_LOG";
const DEFAULT_FILTER: &str = "warn";

pub fn init() {
    let filter = EnvFilter::try_from_env(ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
