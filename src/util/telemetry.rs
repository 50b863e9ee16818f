//! Logging setup for the daemon.
//!
//! Filter directives come from `MIRRORD_LOG`, then `RUST_LOG`, then `info`.

use tracing_subscriber::EnvFilter;

/// Daemon-specific log filter variable. Wins over `RUST_LOG`.
pub const LOG_ENV: &str = "MIRRORD_LOG";

/// Level used when neither variable is set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Pick the filter directives: `mirrord_log`, else `rust_log`, else the
/// default. Blank values count as unset.
pub fn filter_directives(mirrord_log: Option<String>, rust_log: Option<String>) -> String {
    [mirrord_log, rust_log]
        .into_iter()
        .flatten()
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned())
}

fn env_filter() -> EnvFilter {
    let directives = filter_directives(
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("invalid log filter {directives:?} ({e}), using {DEFAULT_LOG_FILTER}");
        EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}

/// Install the fmt subscriber unless the embedding program already set one.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .try_init();
}
