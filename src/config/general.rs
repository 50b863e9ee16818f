//! The reserved `general` section.

use std::path::MAIN_SEPARATOR;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::core::AdmissionLimits;

/// Default log directory for transfer output.
pub const DEFAULT_LOG_DIR: &str = "/var/log/rsync/";

const EMAIL_PATTERN: &str = r"([^@\s]+@[^@\s,]+)";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern is a valid regex"));

/// Daemon-wide settings. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralConfig {
    /// Load average ceiling for non-critical tasks.
    pub load_limit: f64,
    /// Connection ceiling for non-critical tasks.
    pub http_conn: u64,
    /// Maximum concurrently running tasks.
    pub max_tasks: usize,
    /// Directory holding per-task logs. Always ends in a separator.
    pub log_dir: String,
    /// Notification addresses.
    pub emails: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        let limits = AdmissionLimits::default();
        Self {
            load_limit: limits.max_load,
            http_conn: limits.max_connections,
            max_tasks: limits.max_running,
            log_dir: DEFAULT_LOG_DIR.to_owned(),
            emails: Vec::new(),
        }
    }
}

impl GeneralConfig {
    /// Validate ceiling values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.load_limit.is_finite() || self.load_limit <= 0.0 {
            return Err("loadlimit must be a positive number".into());
        }
        if self.max_tasks == 0 {
            return Err("maxtasks must be greater than 0".into());
        }
        if self.log_dir.is_empty() {
            return Err("logdir must not be empty".into());
        }
        Ok(())
    }

    /// Build from the `general` section, if any.
    ///
    /// Never fails: a missing section, a malformed field, or an invalid
    /// result logs a warning and falls back to defaults.
    pub fn from_section(section: Option<&Value>) -> Self {
        let Some(section) = section else {
            warn!("no general section in config, using defaults");
            return Self::default();
        };
        let Some(fields) = section.as_object() else {
            warn!("general section is not an object, using defaults");
            return Self::default();
        };

        let defaults = Self::default();
        let config = Self {
            load_limit: field(fields.get("loadlimit"), "loadlimit", as_f64)
                .unwrap_or(defaults.load_limit),
            http_conn: field(fields.get("httpconn"), "httpconn", as_u64)
                .unwrap_or(defaults.http_conn),
            max_tasks: field(fields.get("maxtasks"), "maxtasks", as_u64)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.max_tasks),
            log_dir: field(fields.get("logdir"), "logdir", |v| v.as_str().map(str::to_owned))
                .map_or(defaults.log_dir, normalize_log_dir),
            emails: fields.get("emails").map(parse_emails).unwrap_or_default(),
        };

        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!(error = %e, "invalid general section, using defaults");
                Self::default()
            }
        }
    }

    /// Admission ceilings derived from this section.
    pub const fn admission_limits(&self) -> AdmissionLimits {
        AdmissionLimits {
            max_load: self.load_limit,
            max_connections: self.http_conn,
            max_running: self.max_tasks,
        }
    }
}

/// Read an optional field, warning when present but unusable.
fn field<T>(value: Option<&Value>, name: &str, parse: impl Fn(&Value) -> Option<T>) -> Option<T> {
    let value = value?;
    let parsed = parse(value);
    if parsed.is_none() {
        warn!(field = name, %value, "malformed general option, using default");
    }
    parsed
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Append a trailing separator if missing.
pub fn normalize_log_dir(dir: String) -> String {
    if dir.is_empty() || dir.ends_with(MAIN_SEPARATOR) {
        dir
    } else {
        format!("{dir}{MAIN_SEPARATOR}")
    }
}

/// Extract `local@domain` tokens from free text or a list of strings.
pub fn parse_emails(value: &Value) -> Vec<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        other => {
            warn!(value = %other, "malformed emails option, ignoring");
            return Vec::new();
        }
    };
    EMAIL_RE
        .captures_iter(&text)
        .map(|c| c[1].to_owned())
        .collect()
}
