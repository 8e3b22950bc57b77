//! Tracing setup for the binary.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "atlantis_config=info,atlantis_core=info";
const VERBOSE_FILTER: &str = "atlantis_config=debug,atlantis_core=debug";

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `verbose`. Calling this twice is a no-op.
pub fn init(verbose: bool) {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
