//! stderr logging for the loaded library.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `pgbridge=debug`).
pub const LOG_ENV: &str = "PGBRIDGE_LOG";

const DEFAULT_FILTER: &str = "warn";

static INIT: Once = Once::new();

/// Install a stderr subscriber unless the host already installed one.
pub fn init() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // Fails only when a global subscriber exists, which then wins
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}
