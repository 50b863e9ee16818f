//! Mirror configuration document: a `general` section plus one section per task.
//!
//! ```json
//! {
//!   "general": { "loadlimit": 4.0, "httpconn": 1200, "logdir": "/var/log/rsync" },
//!   "debian": {
//!     "source": "rsync://ftp.debian.org/debian/",
//!     "target": "/srv/mirror/debian/",
//!     "schedule": { "type": "interval", "secs": 14400 },
//!     "priority": 3
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::general::GeneralConfig;
use crate::core::{CommandSpec, Priority, Schedule, SchedulerError, Task};

/// Section name reserved for daemon-wide settings.
pub const GENERAL_SECTION: &str = "general";

const fn default_enabled() -> bool {
    true
}

/// Options of one task section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Transfer tool invocation.
    #[serde(flatten)]
    pub command: CommandSpec,
    /// When the task runs.
    pub schedule: Schedule,
    /// Lower is more urgent.
    #[serde(default)]
    pub priority: Priority,
    /// Disabled tasks are never queued.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl TaskOptions {
    /// Check the options can form a runnable task.
    pub fn validate(&self) -> Result<(), String> {
        if self.command.source.trim().is_empty() {
            return Err("source must not be empty".into());
        }
        if self.command.target.trim().is_empty() {
            return Err("target must not be empty".into());
        }
        self.schedule.validate()
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MirrorConfig {
    /// Daemon-wide settings.
    pub general: GeneralConfig,
    /// Task sections keyed by task name.
    pub tasks: BTreeMap<String, TaskOptions>,
}

impl MirrorConfig {
    /// Parse a configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, SchedulerError> {
        let document: Value = serde_json::from_str(raw)
            .map_err(|e| SchedulerError::Config(format!("invalid JSON: {e}")))?;
        let Value::Object(mut sections) = document else {
            return Err(SchedulerError::Config(
                "top level must be an object of sections".into(),
            ));
        };
        let general = GeneralConfig::from_section(sections.get(GENERAL_SECTION));
        sections.remove(GENERAL_SECTION);
        let tasks = parse_tasks(sections)?;
        Ok(Self { general, tasks })
    }

    /// Read and parse the configuration file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| SchedulerError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Validate every task section.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        for (name, options) in &self.tasks {
            options
                .validate()
                .map_err(|reason| SchedulerError::InvalidTask {
                    task: name.clone(),
                    reason,
                })?;
        }
        Ok(())
    }

    /// Build tasks in name order.
    pub fn into_tasks(self) -> Result<Vec<Task>, SchedulerError> {
        self.validate()?;
        Ok(self
            .tasks
            .into_iter()
            .map(|(name, options)| {
                Task::new(name, options.command, options.schedule)
                    .with_priority(options.priority)
                    .with_enabled(options.enabled)
            })
            .collect())
    }
}

fn parse_tasks(sections: Map<String, Value>) -> Result<BTreeMap<String, TaskOptions>, SchedulerError> {
    sections
        .into_iter()
        .map(|(name, section)| {
            let options = serde_json::from_value::<TaskOptions>(section).map_err(|e| {
                SchedulerError::InvalidTask {
                    task: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            Ok((name, options))
        })
        .collect()
}
