//! Process seams between the scheduler and the OS.
//!
//! The scheduler never spawns or signals processes directly. A [`Launcher`]
//! turns a task's command into a running [`ProcessHandle`], and whoever
//! observes the process exit reports it through the [`ExitSink`] handed over
//! at launch time.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::core::task::CommandSpec;
use crate::core::SchedulerError;

/// Signals the scheduler may deliver to a task process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Signal {
    /// `SIGTERM`.
    #[default]
    Terminate,
    /// `SIGINT`.
    Interrupt,
    /// `SIGHUP`.
    Hangup,
    /// `SIGKILL`.
    Kill,
}

impl Signal {
    /// Raw signal number for this platform.
    #[cfg(unix)]
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Terminate => libc::SIGTERM,
            Self::Interrupt => libc::SIGINT,
            Self::Hangup => libc::SIGHUP,
            Self::Kill => libc::SIGKILL,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Terminate => "SIGTERM",
            Self::Interrupt => "SIGINT",
            Self::Hangup => "SIGHUP",
            Self::Kill => "SIGKILL",
        };
        f.write_str(name)
    }
}

/// A live process owned by a running task.
pub trait ProcessHandle: Send + Sync + fmt::Debug {
    /// OS process id.
    fn pid(&self) -> u32;
    /// Deliver `signal` to the process. Does not wait.
    fn signal(&self, signal: Signal) -> Result<(), SchedulerError>;
    /// Block until the process has exited and return its exit status.
    fn wait(&self) -> i32;
    /// Exit status if the process has already exited.
    fn try_status(&self) -> Option<i32>;
}

/// Narrow callback through which process exits are reported.
#[derive(Clone)]
pub struct ExitSink {
    notify: Arc<dyn Fn(u32, i32) + Send + Sync>,
}

impl ExitSink {
    /// Wrap a `(pid, exit_status)` callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(u32, i32) + Send + Sync + 'static,
    {
        Self {
            notify: Arc::new(notify),
        }
    }

    /// Sink that drops every notification.
    pub fn discard() -> Self {
        Self::new(|_, _| {})
    }

    /// Report that `pid` exited with `status`.
    pub fn notify(&self, pid: u32, status: i32) {
        (self.notify)(pid, status);
    }
}

impl fmt::Debug for ExitSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitSink").finish_non_exhaustive()
    }
}

/// Spawns the transfer process for a task.
pub trait Launcher: Send + Sync {
    /// Start `command` on behalf of `task_id`.
    ///
    /// The implementation must call `exit_sink.notify` exactly once when the
    /// process exits, after the handle's exit status has been recorded.
    fn launch(
        &self,
        task_id: &str,
        command: &CommandSpec,
        exit_sink: ExitSink,
    ) -> Result<Arc<dyn ProcessHandle>, SchedulerError>;
}

/// One-shot latch holding a process exit status.
///
/// Uses `parking_lot::Condvar` so waiters block without polling.
#[derive(Debug, Default)]
pub struct ExitLatch {
    status: Mutex<Option<i32>>,
    exited: Condvar,
}

impl ExitLatch {
    /// Create an unreleased latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the exit status and wake all waiters. Later calls are ignored.
    pub fn release(&self, status: i32) {
        let mut guard = self.status.lock();
        if guard.is_none() {
            *guard = Some(status);
            self.exited.notify_all();
        }
    }

    /// Block until released.
    pub fn wait(&self) -> i32 {
        let mut guard = self.status.lock();
        loop {
            if let Some(status) = *guard {
                return status;
            }
            self.exited.wait(&mut guard);
        }
    }

    /// Status if already released.
    pub fn try_status(&self) -> Option<i32> {
        *self.status.lock()
    }
}
