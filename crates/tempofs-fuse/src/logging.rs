//! Log filter setup for the mount binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Builds the log filter from `RUST_LOG`-style `directives`.
///
/// Falls back to `info` when the directives are missing, blank or do not parse.
/// `debug` raises the default level to debug on top of whatever the
/// directives say, which also covers the FUSE session's own logging.
pub fn env_filter(directives: Option<&str>, debug: bool) -> EnvFilter {
    let filter = directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    if debug {
        filter.add_directive(LevelFilter::DEBUG.into())
    } else {
        filter
    }
}
