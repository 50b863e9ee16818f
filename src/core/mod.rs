//! Core scheduling abstractions: tasks, the run queue, admission control and
//! the scheduling loop.

pub mod admission;
pub mod error;
pub mod process;
pub mod queue;
pub mod schedule;
pub mod scheduler;
pub mod task;

pub use admission::{
    Admission, AdmissionController, AdmissionLimits, DeferReason, SystemProbe, SystemSample,
};
pub use error::{AppResult, SchedulerError};
pub use process::{ExitLatch, ExitSink, Launcher, ProcessHandle, Signal};
pub use queue::RunQueue;
pub use schedule::Schedule;
pub use scheduler::{
    Phase, ScheduleReport, Scheduler, SchedulerHandle, SchedulerSnapshot, TaskSnapshot,
    DEFAULT_DEFER_SECS, DEFAULT_IDLE_SLEEP,
};
pub use task::{CommandSpec, Priority, Task, CRITICAL_PRIORITY_MAX};
