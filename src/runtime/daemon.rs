//! Daemon entry point shared by the `mirrord` binary.

use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};

use crate::builders::SchedulerBuilder;
use crate::config::MirrorConfig;
use crate::core::AppResult;

/// Load `config_path`, build the scheduler and run it until a shutdown signal.
///
/// Fails before the loop starts when the file is unusable or rsync is missing.
pub fn run_daemon(config_path: impl AsRef<Path>) -> AppResult<()> {
    let config_path = config_path.as_ref();
    let config = MirrorConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!(
        path = %config_path.display(),
        tasks = config.tasks.len(),
        emails = config.general.emails.len(),
        "configuration loaded"
    );

    let scheduler = SchedulerBuilder::new(config)
        .build()
        .context("building scheduler")?;
    if let Ok(snapshot) = serde_json::to_string(&scheduler.snapshot()) {
        debug!(%snapshot, "initial state");
    }

    #[cfg(feature = "tokio-runtime")]
    let _listener = crate::runtime::signals::spawn_signal_listener(scheduler.handle())
        .context("installing signal handlers")?;
    #[cfg(not(feature = "tokio-runtime"))]
    tracing::warn!("built without tokio-runtime, signals will not stop running tasks");

    scheduler.run();
    Ok(())
}
