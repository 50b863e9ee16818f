//! System metric probes backed by `/proc`.

use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::core::SystemProbe;

/// TCP state code for ESTABLISHED in `/proc/net/tcp*`.
const TCP_ESTABLISHED: &str = "01";

/// Reads load average and established TCP connections from procfs.
#[derive(Debug, Clone)]
pub struct ProcProbe {
    loadavg: PathBuf,
    tcp_tables: Vec<PathBuf>,
}

impl Default for ProcProbe {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcProbe {
    /// Probe rooted at `proc_root` (normally `/proc`).
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        let root = proc_root.into();
        Self {
            loadavg: root.join("loadavg"),
            tcp_tables: vec![root.join("net/tcp"), root.join("net/tcp6")],
        }
    }
}

impl SystemProbe for ProcProbe {
    fn load_average(&self) -> f64 {
        match fs::read_to_string(&self.loadavg) {
            Ok(raw) => parse_loadavg(&raw).unwrap_or_else(|| {
                warn!(path = %self.loadavg.display(), "unparseable load average");
                0.0
            }),
            Err(e) => {
                warn!(path = %self.loadavg.display(), error = %e, "cannot read load average");
                0.0
            }
        }
    }

    fn active_connections(&self) -> u64 {
        let mut total = 0;
        for table in &self.tcp_tables {
            match fs::read_to_string(table) {
                Ok(raw) => total += count_established(&raw),
                // tcp6 is absent when IPv6 is disabled
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %table.display(), error = %e, "cannot read tcp table"),
            }
        }
        total
    }
}

/// One-minute load average from the contents of `/proc/loadavg`.
pub fn parse_loadavg(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

/// Count ESTABLISHED sockets in a `/proc/net/tcp` style table.
pub fn count_established(raw: &str) -> u64 {
    let count = raw
        .lines()
        .skip(1)
        .filter(|line| line.split_whitespace().nth(3) == Some(TCP_ESTABLISHED))
        .count();
    u64::try_from(count).unwrap_or(u64::MAX)
}
