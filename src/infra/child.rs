//! OS process handles with a dedicated reaper thread per child.

use std::io;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::core::{ExitLatch, ExitSink, ProcessHandle, SchedulerError, Signal};

/// A spawned child process.
///
/// A reaper thread owns the `std::process::Child`, blocks in `wait()`, then
/// releases the exit latch and reports through the [`ExitSink`].
#[derive(Debug)]
pub struct ChildProcess {
    pid: u32,
    latch: Arc<ExitLatch>,
}

impl ChildProcess {
    /// Spawn `command` for `task_id` and start reaping it.
    pub fn spawn(
        task_id: &str,
        command: &mut Command,
        exit_sink: ExitSink,
    ) -> Result<Self, SchedulerError> {
        let mut child = command.spawn().map_err(|source| SchedulerError::Spawn {
            task: task_id.to_owned(),
            source,
        })?;
        let pid = child.id();
        let latch = Arc::new(ExitLatch::new());

        let reaper_latch = Arc::clone(&latch);
        let name = task_id.to_owned();
        thread::Builder::new()
            .name(format!("reap-{task_id}"))
            .spawn(move || {
                let status = match child.wait() {
                    Ok(status) => exit_code(status),
                    Err(e) => {
                        warn!(task = %name, pid, error = %e, "wait failed");
                        -1
                    }
                };
                debug!(task = %name, pid, status, "reaped child");
                reaper_latch.release(status);
                exit_sink.notify(pid, status);
            })
            .map_err(|source| SchedulerError::Spawn {
                task: task_id.to_owned(),
                source,
            })?;

        Ok(Self { pid, latch })
    }
}

impl ProcessHandle for ChildProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn signal(&self, signal: Signal) -> Result<(), SchedulerError> {
        // Once reaped the pid may belong to someone else.
        if self.latch.try_status().is_some() {
            return Ok(());
        }
        send_signal(self.pid, signal).map_err(|source| SchedulerError::Signal {
            pid: self.pid,
            source,
        })
    }

    fn wait(&self) -> i32 {
        self.latch.wait()
    }

    fn try_status(&self) -> Option<i32> {
        self.latch.try_status()
    }
}

/// Exit code, or `128 + signal` for processes killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) takes plain integers and touches no memory we own.
    let rc = unsafe { libc::kill(pid, signal.as_raw()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: Signal) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are only supported on unix",
    ))
}
