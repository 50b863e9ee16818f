//! In-memory launcher and probe for development and testing.
//!
//! [`InMemoryLauncher`] hands out fake pids and records launches and signals.
//! Processes "exit" when signalled (if configured), straight after launch
//! (if configured) or when a test calls [`InMemoryLauncher::finish`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::core::{
    CommandSpec, ExitLatch, ExitSink, Launcher, ProcessHandle, SchedulerError, Signal,
    SystemProbe, SystemSample,
};

const FIRST_PID: u32 = 1000;

#[derive(Debug, Default)]
struct LauncherLog {
    launched: Vec<String>,
    signals: Vec<(u32, Signal)>,
    failing: HashSet<String>,
    processes: HashMap<u32, Arc<InMemoryProcess>>,
}

/// Launcher that never touches the OS.
#[derive(Debug)]
pub struct InMemoryLauncher {
    next_pid: AtomicU32,
    exit_on_signal: bool,
    exit_on_launch: Option<i32>,
    inline_exit: bool,
    log: Arc<Mutex<LauncherLog>>,
}

impl Default for InMemoryLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLauncher {
    /// Launcher whose processes exit as soon as they are signalled.
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(FIRST_PID),
            exit_on_signal: true,
            exit_on_launch: None,
            inline_exit: false,
            log: Arc::new(Mutex::new(LauncherLog::default())),
        }
    }

    /// Choose whether signalled processes exit.
    #[must_use]
    pub const fn with_exit_on_signal(mut self, exit_on_signal: bool) -> Self {
        self.exit_on_signal = exit_on_signal;
        self
    }

    /// Make every process exit with `status` before `launch` returns.
    ///
    /// The exit is reported on the launching thread.
    #[must_use]
    pub const fn with_exit_on_launch(mut self, status: i32) -> Self {
        self.exit_on_launch = Some(status);
        self
    }

    /// Report signal-triggered exits on the signalling thread instead of a
    /// spawned one.
    #[must_use]
    pub const fn with_inline_exit_reports(mut self, inline: bool) -> Self {
        self.inline_exit = inline;
        self
    }

    /// Make every future launch of `task_id` fail with a spawn error.
    pub fn fail_task(&self, task_id: &str) {
        self.log.lock().failing.insert(task_id.to_owned());
    }

    /// Task ids in launch order.
    pub fn launched(&self) -> Vec<String> {
        self.log.lock().launched.clone()
    }

    /// Signals delivered, in order.
    pub fn signals(&self) -> Vec<(u32, Signal)> {
        self.log.lock().signals.clone()
    }

    /// Process handle for `pid`.
    pub fn process(&self, pid: u32) -> Option<Arc<InMemoryProcess>> {
        self.log.lock().processes.get(&pid).cloned()
    }

    /// Make `pid` exit with `status` and report it through its sink.
    ///
    /// Returns `false` for unknown or already exited pids.
    pub fn finish(&self, pid: u32, status: i32) -> bool {
        let Some(process) = self.process(pid) else {
            return false;
        };
        if process.latch.try_status().is_some() {
            return false;
        }
        process.latch.release(status);
        process.sink.notify(pid, status);
        true
    }
}

impl Launcher for InMemoryLauncher {
    fn launch(
        &self,
        task_id: &str,
        _command: &CommandSpec,
        exit_sink: ExitSink,
    ) -> Result<Arc<dyn ProcessHandle>, SchedulerError> {
        let mut log = self.log.lock();
        if log.failing.contains(task_id) {
            return Err(SchedulerError::Spawn {
                task: task_id.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "simulated spawn failure"),
            });
        }
        let pid = self.next_pid.fetch_add(1, Ordering::AcqRel);
        let process = Arc::new(InMemoryProcess {
            pid,
            exit_on_signal: self.exit_on_signal,
            inline_exit: self.inline_exit,
            latch: ExitLatch::new(),
            sink: exit_sink,
            log: Arc::clone(&self.log),
        });
        log.launched.push(task_id.to_owned());
        log.processes.insert(pid, Arc::clone(&process));
        drop(log);

        if let Some(status) = self.exit_on_launch {
            process.latch.release(status);
            process.sink.notify(pid, status);
        }
        let handle: Arc<dyn ProcessHandle> = process;
        Ok(handle)
    }
}

/// Fake process created by [`InMemoryLauncher`].
#[derive(Debug)]
pub struct InMemoryProcess {
    pid: u32,
    exit_on_signal: bool,
    inline_exit: bool,
    latch: ExitLatch,
    sink: ExitSink,
    log: Arc<Mutex<LauncherLog>>,
}

impl ProcessHandle for InMemoryProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn signal(&self, signal: Signal) -> Result<(), SchedulerError> {
        self.log.lock().signals.push((self.pid, signal));
        if self.exit_on_signal && self.latch.try_status().is_none() {
            let status = signal_exit_status(signal);
            self.latch.release(status);
            if self.inline_exit {
                self.sink.notify(self.pid, status);
                return Ok(());
            }
            // Exit reports arrive from another thread, as with a real reaper.
            let sink = self.sink.clone();
            let pid = self.pid;
            thread::spawn(move || sink.notify(pid, status));
        }
        Ok(())
    }

    fn wait(&self) -> i32 {
        self.latch.wait()
    }

    fn try_status(&self) -> Option<i32> {
        self.latch.try_status()
    }
}

/// Shell-style status for a process killed by `signal`.
const fn signal_exit_status(signal: Signal) -> i32 {
    128 + match signal {
        Signal::Hangup => 1,
        Signal::Interrupt => 2,
        Signal::Kill => 9,
        Signal::Terminate => 15,
    }
}

/// Probe returning whatever it was last told.
#[derive(Debug, Default)]
pub struct StaticProbe {
    sample: Mutex<SystemSample>,
}

impl StaticProbe {
    /// Probe reporting `load_average` and `connections`.
    pub fn new(load_average: f64, connections: u64) -> Self {
        Self {
            sample: Mutex::new(SystemSample {
                load_average,
                connections,
            }),
        }
    }

    /// Probe reporting an idle system.
    pub fn idle() -> Self {
        Self::new(0.0, 0)
    }

    /// Change the reported values.
    pub fn set(&self, load_average: f64, connections: u64) {
        *self.sample.lock() = SystemSample {
            load_average,
            connections,
        };
    }
}

impl SystemProbe for StaticProbe {
    fn load_average(&self) -> f64 {
        self.sample.lock().load_average
    }

    fn active_connections(&self) -> u64 {
        self.sample.lock().connections
    }
}
