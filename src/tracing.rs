//! Tracing (logging)

use crate::cli::{CommandLineArgs, LogFormat};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives used when `RUST_LOG` is not set.
const DEFAULT_DIRECTIVES: &str = "usagestat=debug,tower_http=debug";

/// Returns the filter from `RUST_LOG`, or the default directives.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVES.into())
}

/// Initialise tracing (logging)
///
/// Applies a filter based on the `RUST_LOG` environment variable, falling back to enable debug
/// logging for this crate and tower_http if not set. Events are written to stdout as plain text
/// or as one JSON object per line, depending on `--log-format`.
pub fn init_tracing(args: &CommandLineArgs) {
    let registry = tracing_subscriber::registry().with(env_filter());
    match args.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
    }
}
