//! The mirror scheduling loop.
//!
//! One control thread cycles through `Sleeping -> Waking -> Scheduling`:
//!
//! - **Sleeping** appends every enabled, idle, unqueued task to the
//!   [`RunQueue`] and blocks until the earliest queued time (or a short idle
//!   interval when the queue is empty).
//! - **Waking** samples system metrics once for the whole pass.
//! - **Scheduling** walks the queue in time order over the current one-minute
//!   window, dispatching or deferring each due task, and stops at the first
//!   entry past the window.
//!
//! Task set and queue sit behind one `parking_lot::Mutex` shared with the
//! exit-notification path ([`SchedulerHandle::stop_task_by_process_id`]). The
//! lock is never held while sleeping, launching, signalling or waiting on a
//! process, so exit reports may arrive on any thread, including inline.
//!
//! A shutdown request ends the sleep through a crossbeam channel and leaves the
//! loop through [`Scheduler::shutdown`], which stops every running task.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::core::admission::{Admission, AdmissionController, SystemProbe, SystemSample};
use crate::core::process::{ExitSink, Launcher, ProcessHandle, Signal};
use crate::core::queue::RunQueue;
use crate::core::task::{CommandSpec, Task};
use crate::core::SchedulerError;
use crate::util::clock::{format_utc, minute_window, Clock, UnixTime};

/// Seconds added to a task's queued time when admission defers it.
pub const DEFAULT_DEFER_SECS: i64 = 1800;

/// How long to sleep when nothing is queued.
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_secs(5);

/// Where the control loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Blocked until the next queued time.
    Sleeping,
    /// Sampling system metrics.
    Waking,
    /// Walking the queue.
    Scheduling,
    /// Stopping tasks before exit.
    ShuttingDown,
}

/// What one scheduling pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Window `[start, end)` the pass covered.
    pub window: (UnixTime, UnixTime),
    /// Task ids examined, in walk order.
    pub inspected: Vec<String>,
    /// Started tasks with their pids.
    pub dispatched: Vec<(String, u32)>,
    /// Deferred tasks with their new queued time.
    pub deferred: Vec<(String, UnixTime)>,
    /// Tasks whose process failed to spawn.
    pub failed: Vec<String>,
}

/// Point-in-time view of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    /// Task name.
    pub id: String,
    /// Priority value.
    pub priority: u32,
    /// Whether the task may be queued.
    pub enabled: bool,
    /// Whether a process is live.
    pub running: bool,
    /// Pid of the live process.
    pub pid: Option<u32>,
    /// Queued time, when queued.
    pub queued_at: Option<UnixTime>,
    /// Human-readable schedule.
    pub schedule: String,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    /// Current loop phase.
    pub phase: Phase,
    /// Number of running tasks.
    pub running: usize,
    /// Number of queued tasks.
    pub queued: usize,
    /// Per-task state, ordered by id.
    pub tasks: Vec<TaskSnapshot>,
}

struct SchedulerState {
    tasks: BTreeMap<String, Task>,
    queue: RunQueue,
    phase: Phase,
}

impl SchedulerState {
    fn running_count(&self) -> usize {
        self.tasks.values().filter(|t| t.running()).count()
    }

    /// Queue every enabled, idle task not already queued.
    fn append_tasks(&mut self, now: UnixTime) -> usize {
        let mut added = 0;
        for (id, task) in &self.tasks {
            if task.running() || !task.enabled() {
                continue;
            }
            if self.queue.insert(id, task.get_schedule_time(now)) {
                added += 1;
            }
        }
        added
    }

    fn mark_exited_by_pid(&mut self, pid: u32) -> Option<String> {
        let (id, task) = self
            .tasks
            .iter_mut()
            .find(|(_, t)| t.running() && t.pid() == Some(pid))?;
        task.mark_exited();
        Some(id.clone())
    }

    fn snapshot(&self) -> SchedulerSnapshot {
        let tasks = self
            .tasks
            .values()
            .map(|t| TaskSnapshot {
                id: t.id().to_owned(),
                priority: t.priority().0,
                enabled: t.enabled(),
                running: t.running(),
                pid: t.pid(),
                queued_at: self.queue.get(t.id()),
                schedule: t.schedule().to_string(),
            })
            .collect();
        SchedulerSnapshot {
            phase: self.phase,
            running: self.running_count(),
            queued: self.queue.len(),
            tasks,
        }
    }
}

/// Cloneable control surface for code outside the loop thread.
///
/// Signal handlers and process reapers use this to request shutdown or report
/// process exits.
#[derive(Clone)]
pub struct SchedulerHandle {
    state: Arc<Mutex<SchedulerState>>,
    shutdown_tx: Sender<()>,
}

impl SchedulerHandle {
    /// Ask the loop to stop sleeping, stop all tasks and return.
    pub fn request_shutdown(&self) {
        // A full channel means a request is already pending.
        let _ = self.shutdown_tx.try_send(());
    }

    /// Mark the task owning `pid` as exited.
    ///
    /// Unknown pids are ignored. Returns the task id when one matched.
    pub fn stop_task_by_process_id(&self, pid: u32, exit_status: i32) -> Option<String> {
        let mut state = self.state.lock();
        if let Some(id) = state.mark_exited_by_pid(pid) {
            info!(task = %id, pid, status = exit_status, "task ended");
            Some(id)
        } else {
            debug!(pid, status = exit_status, "exit for untracked pid ignored");
            None
        }
    }

    /// Send `SIGTERM` to a running task without waiting for it to exit.
    ///
    /// Unknown and idle tasks are a no-op returning `Ok(None)`.
    pub fn stop_task(&self, id: &str) -> Result<Option<u32>, SchedulerError> {
        // Signal without the lock: the process may report its exit inline.
        let process = {
            let state = self.state.lock();
            state
                .tasks
                .get(id)
                .filter(|t| t.running())
                .and_then(Task::process)
        };
        let Some(process) = process else {
            return Ok(None);
        };
        let pid = process.pid();
        process.signal(Signal::Terminate)?;
        info!(task = %id, pid, "killed task");
        Ok(Some(pid))
    }

    /// Current state of all tasks.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.state.lock().snapshot()
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle").finish_non_exhaustive()
    }
}

/// Periodic launcher of mirror tasks.
pub struct Scheduler {
    state: Arc<Mutex<SchedulerState>>,
    admission: AdmissionController,
    launcher: Arc<dyn Launcher>,
    probe: Arc<dyn SystemProbe>,
    clock: Arc<dyn Clock>,
    defer_delay: i64,
    idle_sleep: Duration,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("admission", &self.admission)
            .field("defer_delay", &self.defer_delay)
            .field("idle_sleep", &self.idle_sleep)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler over `tasks`. Duplicate ids keep the last task.
    pub fn new(
        tasks: impl IntoIterator<Item = Task>,
        admission: AdmissionController,
        launcher: Arc<dyn Launcher>,
        probe: Arc<dyn SystemProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tasks = tasks
            .into_iter()
            .map(|t| (t.id().to_owned(), t))
            .collect::<BTreeMap<_, _>>();
        let (shutdown_tx, shutdown_rx) = bounded(1);
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                tasks,
                queue: RunQueue::new(),
                phase: Phase::Sleeping,
            })),
            admission,
            launcher,
            probe,
            clock,
            defer_delay: DEFAULT_DEFER_SECS,
            idle_sleep: DEFAULT_IDLE_SLEEP,
            shutdown_tx,
            shutdown_rx,
        }
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

    /// Handle for signal handlers and exit reporters.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            state: Arc::clone(&self.state),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Admission ceilings in force.
    pub const fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Current loop phase.
    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Number of tasks with a live process.
    pub fn running_count(&self) -> usize {
        self.state.lock().running_count()
    }

    /// Queued time of `id`, if queued.
    pub fn queued_time(&self, id: &str) -> Option<UnixTime> {
        self.state.lock().queue.get(id)
    }

    /// Number of queued tasks.
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether `id` has a live process.
    pub fn is_running(&self, id: &str) -> bool {
        self.state.lock().tasks.get(id).is_some_and(Task::running)
    }

    /// Current state of all tasks.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.state.lock().snapshot()
    }

    /// Run until shutdown is requested, then stop every running task.
    pub fn run(&self) {
        info!(tasks = self.state.lock().tasks.len(), "scheduler started");
        loop {
            let nap = self.prepare_sleep();
            if self.sleep(nap) {
                break;
            }
            info!("waking up");
            let sample = self.wake();
            self.schedule(&sample);
        }
        self.shutdown(Signal::Terminate);
    }

    /// Queue eligible tasks and return how long to sleep.
    pub fn prepare_sleep(&self) -> Duration {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.phase = Phase::Sleeping;
        let added = state.append_tasks(now);
        if added > 0 {
            debug!(added, queued = state.queue.len(), "queued eligible tasks");
        }
        let nap = match state.queue.earliest() {
            Some((_, at)) => Duration::from_secs(u64::try_from(at - now).unwrap_or(0)),
            None => self.idle_sleep,
        };
        drop(state);
        let wake_at = now.saturating_add(i64::try_from(nap.as_secs()).unwrap_or(i64::MAX));
        info!(next_wake = %format_utc(wake_at), "going to sleep");
        nap
    }

    /// Queue every enabled, idle task not already queued, using the clock's
    /// current time. Returns how many entries were added.
    pub fn append_tasks(&self) -> usize {
        let now = self.clock.now();
        self.state.lock().append_tasks(now)
    }

    /// Block for `nap`. Returns `true` if shutdown was requested.
    fn sleep(&self, nap: Duration) -> bool {
        match self.shutdown_rx.recv_timeout(nap) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Sample system metrics for the coming pass.
    pub fn wake(&self) -> SystemSample {
        self.state.lock().phase = Phase::Waking;
        let sample = self.probe.sample();
        debug!(
            load = sample.load_average,
            connections = sample.connections,
            "sampled system"
        );
        sample
    }

    /// Dispatch or defer every task due in the current minute window.
    pub fn schedule(&self, sample: &SystemSample) -> ScheduleReport {
        let now = self.clock.now();
        let (start, end) = minute_window(now);
        let mut report = ScheduleReport {
            window: (start, end),
            ..ScheduleReport::default()
        };

        let entries = {
            let mut state = self.state.lock();
            state.phase = Phase::Scheduling;
            state.queue.ordered()
        };
        if entries.is_empty() {
            info!("no task needed to start");
            return report;
        }

        for (id, at) in entries {
            // Entries are ascending; nothing after this one is due either.
            if at >= end {
                break;
            }
            if at < start {
                debug!(task = %id, overdue_secs = start - at, "overdue task treated as due");
            }
            report.inspected.push(id.clone());
            if let Some(command) = self.admit(&id, sample, &mut report) {
                self.run_task(&id, &command, &mut report);
            }
        }
        report
    }

    /// Apply admission to `id`. Returns the command to launch on dispatch.
    fn admit(
        &self,
        id: &str,
        sample: &SystemSample,
        report: &mut ScheduleReport,
    ) -> Option<CommandSpec> {
        let mut state = self.state.lock();
        let Some(task) = state.tasks.get(id) else {
            warn!(task = %id, "queued id has no task");
            state.queue.remove(id);
            return None;
        };
        if task.running() {
            state.queue.remove(id);
            debug!(task = %id, "dropped stale queue entry for running task");
            return None;
        }
        let priority = task.priority();
        let command = task.command().clone();
        match self.admission.evaluate(priority, sample, state.running_count()) {
            Admission::Defer(reason) => {
                info!(task = %id, %reason, "task not scheduled");
                if let Some(next) = state.queue.defer(id, self.defer_delay) {
                    report.deferred.push((id.to_owned(), next));
                }
                None
            }
            Admission::Dispatch => {
                info!(task = %id, %priority, "starting task");
                Some(command)
            }
        }
    }

    /// Launch `id` with the state lock released, then record the outcome.
    ///
    /// Only the loop thread dispatches, so the task cannot start elsewhere
    /// while the lock is dropped.
    fn run_task(&self, id: &str, command: &CommandSpec, report: &mut ScheduleReport) {
        let launched = self.launcher.launch(id, command, self.exit_sink());

        let mut state = self.state.lock();
        let process = match launched {
            Ok(process) => process,
            Err(e) => {
                error!(task = %id, error = %e, "failed to start task");
                state.queue.defer(id, self.defer_delay);
                report.failed.push(id.to_owned());
                return;
            }
        };
        state.queue.remove(id);
        let pid = process.pid();
        report.dispatched.push((id.to_owned(), pid));

        // An exit reported before we re-locked found no running task to clear.
        if let Some(status) = process.try_status() {
            info!(task = %id, pid, status, "task ended before it was recorded");
            return;
        }
        match state.tasks.get_mut(id).map(|task| task.attach(process)) {
            Some(Ok(pid)) => info!(task = %id, pid, "task began to run"),
            Some(Err(e)) => warn!(task = %id, pid, error = %e, "launched process not recorded"),
            None => warn!(task = %id, pid, "launched process for unknown task"),
        }
    }

    /// Push `id` back by the deferral delay. Untracked ids are ignored.
    pub fn defer_task(&self, id: &str) -> Option<UnixTime> {
        self.state.lock().queue.defer(id, self.defer_delay)
    }

    fn exit_sink(&self) -> ExitSink {
        let handle = self.handle();
        ExitSink::new(move |pid, status| {
            handle.stop_task_by_process_id(pid, status);
        })
    }

    /// Send `SIGTERM` to a running task without waiting.
    pub fn stop_task(&self, id: &str) -> Result<Option<u32>, SchedulerError> {
        self.handle().stop_task(id)
    }

    /// Mark the task owning `pid` as exited.
    pub fn stop_task_by_process_id(&self, pid: u32, exit_status: i32) -> Option<String> {
        self.handle().stop_task_by_process_id(pid, exit_status)
    }

    /// Signal every running task in id order, waiting for each to exit
    /// before moving on. Only for shutdown.
    ///
    /// Returns the ids that were stopped.
    pub fn stop_all_tasks(&self, signal: Signal) -> Vec<String> {
        let running: Vec<(String, Arc<dyn ProcessHandle>)> = {
            let state = self.state.lock();
            state
                .tasks
                .values()
                .filter(|t| t.running())
                .filter_map(|t| t.process().map(|p| (t.id().to_owned(), p)))
                .collect()
        };

        let mut stopped = Vec::with_capacity(running.len());
        for (id, process) in running {
            let pid = process.pid();
            if let Err(e) = process.signal(signal) {
                if process.try_status().is_none() {
                    error!(task = %id, pid, error = %e, "could not signal task, not waiting");
                    continue;
                }
            }
            let status = process.wait();
            {
                let mut state = self.state.lock();
                if let Some(task) = state.tasks.get_mut(&id) {
                    if task.pid() == Some(pid) {
                        task.mark_exited();
                    }
                }
            }
            info!(task = %id, pid, status, %signal, "killed task");
            stopped.push(id);
        }
        stopped
    }

    /// Leave the loop: stop all tasks with `signal`.
    pub fn shutdown(&self, signal: Signal) -> Vec<String> {
        self.state.lock().phase = Phase::ShuttingDown;
        info!(%signal, "shutting down, stopping running tasks");
        let stopped = self.stop_all_tasks(signal);
        info!(stopped = stopped.len(), "scheduler stopped");
        stopped
    }
}
