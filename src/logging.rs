//! Tracing initialisation.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the `EnvFilter` directives.
pub const LOG_ENV: &str = "PROJRES_LOG";

const DEFAULT_FILTER: &str = "project_resolver=info,project_resolver_core=info";

static INIT: Once = Once::new();

/// Install the fmt subscriber on stderr.
///
/// Reads `PROJRES_LOG` (e.g. `PROJRES_LOG=project_resolver_core=debug`) and
/// falls back to info for both crates when it is unset or invalid. Stdout
/// is left to command output. Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .try_init();
    });
}
