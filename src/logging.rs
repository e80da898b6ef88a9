//! Tracing setup. Logs go to stderr; stdout belongs to the MCP transport.

use tracing_subscriber::EnvFilter;

/// `--verbose` wins, then `RUST_LOG`, then the configured directive.
pub fn filter(default_directive: &str, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(default_directive: &str, verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive, verbose))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_forces_debug() {
        assert_eq!(filter("warn", true).to_string(), "debug");
    }
}
