//! Tracing subscriber setup for the CLI.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Map the `-v` count onto a default filter directive.
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize a tracing subscriber writing compact logs to stderr.
///
/// `RUST_LOG` takes precedence; otherwise the level comes from `verbosity`.
/// Calling this more than once returns an error from the second call.
pub fn init(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact();

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbosity)))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
