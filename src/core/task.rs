//! Mirror tasks and their runtime state.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::process::{ExitSink, Launcher, ProcessHandle, Signal};
use crate::core::schedule::Schedule;
use crate::core::SchedulerError;
use crate::util::clock::UnixTime;

/// Highest priority value that still counts as critical.
pub const CRITICAL_PRIORITY_MAX: u32 = 4;

/// Task priority. Lower is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u32);

impl Priority {
    /// Priority used when a task does not set one.
    pub const DEFAULT: Self = Self(10);

    /// Critical tasks skip load and connection gating.
    pub const fn is_critical(self) -> bool {
        self.0 <= CRITICAL_PRIORITY_MAX
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the transfer tool should do for one task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Remote source, e.g. `rsync://mirror.example.org/debian/`.
    pub source: String,
    /// Local destination directory.
    pub target: String,
    /// Extra arguments passed through verbatim.
    #[serde(default)]
    pub args: Vec<String>,
    /// Exclude patterns.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Password file for authenticated sources.
    #[serde(default)]
    pub password_file: Option<String>,
    /// I/O timeout handed to the transfer tool, in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// One mirror job.
#[derive(Debug)]
pub struct Task {
    id: String,
    command: CommandSpec,
    schedule: Schedule,
    priority: Priority,
    enabled: bool,
    running: bool,
    process: Option<Arc<dyn ProcessHandle>>,
}

impl Task {
    /// Create an enabled task with default priority.
    pub fn new(id: impl Into<String>, command: CommandSpec, schedule: Schedule) -> Self {
        Self {
            id: id.into(),
            command,
            schedule,
            priority: Priority::DEFAULT,
            enabled: true,
            running: false,
            process: None,
        }
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Enable or disable the task.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Task name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Command handed to the launcher.
    pub const fn command(&self) -> &CommandSpec {
        &self.command
    }

    /// Run schedule.
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Task priority.
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Whether the task may be queued at all.
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// True from a successful start until the exit is observed.
    pub const fn running(&self) -> bool {
        self.running
    }

    /// Pid of the live process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.pid())
    }

    /// Handle of the live process, if any.
    pub fn process(&self) -> Option<Arc<dyn ProcessHandle>> {
        self.process.clone()
    }

    /// Next eligible run time at or after `reference`.
    pub fn get_schedule_time(&self, reference: UnixTime) -> UnixTime {
        self.schedule.next_at_or_after(reference)
    }

    /// Spawn the process and mark the task running.
    pub fn start(
        &mut self,
        launcher: &dyn Launcher,
        exit_sink: ExitSink,
    ) -> Result<u32, SchedulerError> {
        if self.running {
            return Err(SchedulerError::AlreadyRunning(self.id.clone()));
        }
        let process = launcher.launch(&self.id, &self.command, exit_sink)?;
        self.attach(process)
    }

    /// Record a process launched for this task and mark it running.
    ///
    /// Used when the launch happened elsewhere, e.g. outside a lock.
    pub fn attach(&mut self, process: Arc<dyn ProcessHandle>) -> Result<u32, SchedulerError> {
        if self.running {
            return Err(SchedulerError::AlreadyRunning(self.id.clone()));
        }
        let pid = process.pid();
        self.process = Some(process);
        self.running = true;
        Ok(pid)
    }

    /// Deliver `signal` to the running process. No-op when not running.
    ///
    /// Returns the signalled pid.
    pub fn stop(&self, signal: Signal) -> Result<Option<u32>, SchedulerError> {
        if !self.running {
            return Ok(None);
        }
        let Some(process) = self.process.as_ref() else {
            return Ok(None);
        };
        process.signal(signal)?;
        Ok(Some(process.pid()))
    }

    /// Record that the process exited. Returns the released handle.
    pub fn mark_exited(&mut self) -> Option<Arc<dyn ProcessHandle>> {
        self.running = false;
        self.process.take()
    }
}
