//! Logging setup shared by pyhost binaries.
//!
//! Logs go to stderr so they never interleave with Python output that the
//! redirect forwards to the host's stdout.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with pyhost defaults.
///
/// Sets up tracing-subscriber with:
/// - Environment filter (RUST_LOG)
/// - Compact format on stderr
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
///
/// `RUST_LOG` still wins when it is set.
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Log prefixes for interpreter lifecycle events.
pub mod prefix {
    /// Interpreter startup
    pub const OPEN: &str = "✿";
    /// Interpreter shutdown
    pub const CLOSE: &str = "❀";
}
