//! trigr library - expose command modules for the binary and tests

pub mod commands;
pub mod common;
pub mod errors;

pub use common::GlobalOpts;
pub use trigr_logger as logger;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding the tracing filter
pub const LOG_ENV: &str = "TRIGR_LOG";

/// Install the tracing subscriber for the compiler crates
///
/// `TRIGR_LOG` takes precedence; otherwise the filter follows the logger's
/// verbosity. Output goes to stderr so `--stdout` manifests stay clean.
pub fn init_tracing(no_color: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(logger::verbosity_to_filter()));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(!no_color)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
