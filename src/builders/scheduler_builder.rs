//! Builder assembling a [`Scheduler`] from configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::MirrorConfig;
use crate::core::{
    AdmissionController, Launcher, Scheduler, SchedulerError, SystemProbe, DEFAULT_DEFER_SECS,
    DEFAULT_IDLE_SLEEP,
};
use crate::infra::rsync::{find_transfer_tool, RSYNC};
use crate::infra::{ProcProbe, RsyncLauncher};
use crate::util::clock::{Clock, SystemClock};

/// Builds a scheduler from a [`MirrorConfig`].
///
/// Without an explicit launcher, `build` locates rsync on `PATH` and fails
/// with [`SchedulerError::TransferToolNotFound`] when it is missing.
pub struct SchedulerBuilder {
    config: MirrorConfig,
    launcher: Option<Arc<dyn Launcher>>,
    probe: Option<Arc<dyn SystemProbe>>,
    clock: Option<Arc<dyn Clock>>,
    defer_delay: i64,
    idle_sleep: Duration,
}

impl SchedulerBuilder {
    /// Start from a parsed configuration.
    pub fn new(config: MirrorConfig) -> Self {
        Self {
            config,
            launcher: None,
            probe: None,
            clock: None,
            defer_delay: DEFAULT_DEFER_SECS,
            idle_sleep: DEFAULT_IDLE_SLEEP,
        }
    }

    /// Configuration being built from.
    pub const fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Use `launcher` instead of rsync.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Use `probe` instead of procfs.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn SystemProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Use `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Override the deferral delay in seconds.
    #[must_use]
    pub const fn with_defer_delay(mut self, secs: i64) -> Self {
        self.defer_delay = secs;
        self
    }

    /// Override the idle re-poll interval.
    #[must_use]
    pub const fn with_idle_sleep(mut self, idle: Duration) -> Self {
        self.idle_sleep = idle;
        self
    }

    /// Validate tasks and assemble the scheduler.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        if self.defer_delay <= 0 {
            return Err(SchedulerError::Config(
                "defer delay must be greater than 0".into(),
            ));
        }
        let limits = self.config.general.admission_limits();
        let launcher = match self.launcher {
            Some(launcher) => launcher,
            None => {
                let rsync = find_transfer_tool(RSYNC)?;
                info!(rsync = %rsync.display(), log_dir = %self.config.general.log_dir, "using rsync");
                Arc::new(RsyncLauncher::new(rsync, &self.config.general.log_dir))
            }
        };
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(ProcProbe::default()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let tasks = self.config.into_tasks()?;

        info!(
            tasks = tasks.len(),
            max_load = limits.max_load,
            max_connections = limits.max_connections,
            max_running = limits.max_running,
            "scheduler configured"
        );
        Ok(
            Scheduler::new(tasks, AdmissionController::new(limits), launcher, probe, clock)
                .with_defer_delay(self.defer_delay)
                .with_idle_sleep(self.idle_sleep),
        )
    }
}

impl std::fmt::Debug for SchedulerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("config", &self.config)
            .field("defer_delay", &self.defer_delay)
            .field("idle_sleep", &self.idle_sleep)
            .finish_non_exhaustive()
    }
}
