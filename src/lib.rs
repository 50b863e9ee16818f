//! # Mirror Scheduler
//!
//! A load-aware scheduler for periodic rsync mirror jobs.
//!
//! Each configured mirror is a [`core::Task`] with a [`core::Schedule`] and a
//! priority. The [`core::Scheduler`] keeps a time-ordered [`core::RunQueue`] of
//! idle tasks, sleeps until the earliest one is due, then walks every task due
//! in the current one-minute window and asks the
//! [`core::AdmissionController`] whether it may start:
//!
//! - **Load and connections**: non-critical tasks (priority above 4) wait
//!   while the one-minute load average or the active connection count is
//!   above its ceiling.
//! - **Concurrency**: no task starts while the running count is at the
//!   ceiling, whatever its priority.
//!
//! A task that may not start is pushed back 30 minutes. A task that starts
//! leaves the queue until its process exits, when it becomes eligible again.
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mirror_scheduler::builders::SchedulerBuilder;
//! use mirror_scheduler::config::MirrorConfig;
//! use mirror_scheduler::infra::StaticProbe;
//!
//! # fn main() -> mirror_scheduler::core::AppResult<()> {
//! let config = MirrorConfig::from_file("mirror.json")?;
//! let scheduler = SchedulerBuilder::new(config)
//!     .with_probe(Arc::new(StaticProbe::idle()))
//!     .build()?;
//!
//! // Any thread may ask the loop to stop.
//! let handle = scheduler.handle();
//! std::thread::spawn(move || handle.request_shutdown());
//!
//! scheduler.run();
//! # Ok(())
//! # }
//! ```
//!
//! The `mirrord` binary wraps the same steps in
//! [`runtime::run_daemon`] and stops on SIGTERM or SIGINT.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Tasks, queue, admission control and the scheduling loop.
pub mod core;
/// Configuration file model.
pub mod config;
/// Builders to construct the scheduler from configuration.
pub mod builders;
/// Process launching, system probes and in-memory doubles.
pub mod infra;
/// Signal handling and the daemon entry point.
pub mod runtime;
/// Shared utilities.
pub mod util;
