//! Logging and tracing configuration
//!
//! Diagnostics go to stderr so that stdout stays reserved for the
//! per-test status lines.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    init_with_default("runtests=info,warn");
}

/// Initialize tracing with a verbose default (`--verbose`)
pub fn init_verbose() {
    init_with_default("runtests=debug,info");
}

fn init_with_default(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    // try_init: integration tests may install a subscriber more than once
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}
