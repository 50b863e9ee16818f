//! Admission control for task dispatch.
//!
//! Load and connection ceilings are soft signals that critical tasks
//! (priority <= 4) ignore. The concurrency ceiling is a hard limit for every
//! priority.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::task::Priority;

/// System metrics sampled once per wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemSample {
    /// One-minute load average.
    pub load_average: f64,
    /// Active network connections.
    pub connections: u64,
}

/// Source of system metrics.
pub trait SystemProbe: Send + Sync {
    /// Current load average.
    fn load_average(&self) -> f64;
    /// Current number of active connections.
    fn active_connections(&self) -> u64;

    /// Take both readings.
    fn sample(&self) -> SystemSample {
        SystemSample {
            load_average: self.load_average(),
            connections: self.active_connections(),
        }
    }
}

/// Ceilings enforced before a task may start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdmissionLimits {
    /// Load average above which non-critical tasks wait.
    pub max_load: f64,
    /// Connection count above which non-critical tasks wait.
    pub max_connections: u64,
    /// Maximum concurrently running tasks.
    pub max_running: usize,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            max_load: 4.0,
            max_connections: 1200,
            max_running: 10,
        }
    }
}

/// Why a task was not started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeferReason {
    /// Load average over the ceiling.
    Load {
        /// Sampled load.
        current: f64,
        /// Configured ceiling.
        limit: f64,
    },
    /// Connection count over the ceiling.
    Connections {
        /// Sampled connections.
        current: u64,
        /// Configured ceiling.
        limit: u64,
    },
    /// Too many tasks already running.
    Concurrency {
        /// Running tasks.
        running: usize,
        /// Configured ceiling.
        limit: usize,
    },
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { current, limit } => {
                write!(f, "system load {current:.2} is higher than {limit:.2}")
            }
            Self::Connections { current, limit } => {
                write!(f, "connections {current} is larger than {limit}")
            }
            Self::Concurrency { running, limit } => {
                write!(f, "running tasks {running} reached limit {limit}")
            }
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// Start the task now.
    Dispatch,
    /// Push the task back.
    Defer(DeferReason),
}

/// Applies [`AdmissionLimits`] to candidate tasks.
#[derive(Debug, Clone, Default)]
pub struct AdmissionController {
    limits: AdmissionLimits,
}

impl AdmissionController {
    /// Create a controller with the given ceilings.
    pub const fn new(limits: AdmissionLimits) -> Self {
        Self { limits }
    }

    /// Configured ceilings.
    pub const fn limits(&self) -> &AdmissionLimits {
        &self.limits
    }

    /// Decide whether a task with `priority` may start given `sample` and
    /// the current number of running tasks.
    pub fn evaluate(&self, priority: Priority, sample: &SystemSample, running: usize) -> Admission {
        let limits = &self.limits;
        if !priority.is_critical() {
            if sample.load_average > limits.max_load {
                return Admission::Defer(DeferReason::Load {
                    current: sample.load_average,
                    limit: limits.max_load,
                });
            }
            if sample.connections > limits.max_connections {
                return Admission::Defer(DeferReason::Connections {
                    current: sample.connections,
                    limit: limits.max_connections,
                });
            }
        }
        if running >= limits.max_running {
            return Admission::Defer(DeferReason::Concurrency {
                running,
                limit: limits.max_running,
            });
        }
        Admission::Dispatch
    }
}
