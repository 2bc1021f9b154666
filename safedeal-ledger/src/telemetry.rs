//! Tracing setup for processes hosting the ledger

use tracing_subscriber::{fmt, EnvFilter};

/// Install a fmt subscriber. `RUST_LOG` wins over `default_filter` when set.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).try_init().is_ok()
}
