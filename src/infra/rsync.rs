//! rsync location and invocation.

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::debug;

use crate::core::{CommandSpec, ExitSink, Launcher, ProcessHandle, SchedulerError};
use crate::infra::child::ChildProcess;

/// Name of the transfer tool executable.
pub const RSYNC: &str = "rsync";

/// Flags every mirror run starts with.
pub const DEFAULT_RSYNC_FLAGS: &[&str] = &[
    "-aHvh",
    "--no-motd",
    "--safe-links",
    "--delete-after",
    "--delay-updates",
    "--stats",
];

/// Locate `name` on `PATH`. Missing tool is fatal for the daemon.
pub fn find_transfer_tool(name: &str) -> Result<PathBuf, SchedulerError> {
    which::which(name).map_err(|e| {
        debug!(tool = %name, error = %e, "transfer tool lookup failed");
        SchedulerError::TransferToolNotFound(name.to_owned())
    })
}

/// Search a `PATH`-style list for an executable file called `name`.
pub fn find_in_path(name: &str, path: &OsStr) -> Option<PathBuf> {
    which::which_in(name, Some(path), ".").ok()
}

/// Full argument list for one run, without the program name.
pub fn build_args(spec: &CommandSpec) -> Vec<String> {
    let mut args: Vec<String> = DEFAULT_RSYNC_FLAGS.iter().map(|s| (*s).to_owned()).collect();
    args.extend(spec.args.iter().cloned());
    args.extend(spec.exclude.iter().map(|pattern| format!("--exclude={pattern}")));
    if let Some(password_file) = &spec.password_file {
        args.push(format!("--password-file={password_file}"));
    }
    if let Some(timeout) = spec.timeout_secs {
        args.push(format!("--timeout={timeout}"));
    }
    args.push(spec.source.clone());
    args.push(spec.target.clone());
    args
}

/// Launches rsync with output appended to `<log_dir>/<task>.log`.
#[derive(Debug, Clone)]
pub struct RsyncLauncher {
    rsync: PathBuf,
    log_dir: PathBuf,
}

impl RsyncLauncher {
    /// Launcher using the rsync binary at `rsync`.
    pub fn new(rsync: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            rsync: rsync.into(),
            log_dir: log_dir.into(),
        }
    }

    /// Path of the rsync binary.
    pub fn rsync(&self) -> &Path {
        &self.rsync
    }

    /// Log file for `task_id`.
    pub fn log_path(&self, task_id: &str) -> PathBuf {
        self.log_dir.join(format!("{task_id}.log"))
    }

    fn open_log(&self, task_id: &str) -> std::io::Result<File> {
        fs::create_dir_all(&self.log_dir)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(task_id))
    }
}

impl Launcher for RsyncLauncher {
    fn launch(
        &self,
        task_id: &str,
        spec: &CommandSpec,
        exit_sink: ExitSink,
    ) -> Result<Arc<dyn ProcessHandle>, SchedulerError> {
        let spawn_err = |source| SchedulerError::Spawn {
            task: task_id.to_owned(),
            source,
        };
        let stdout = self.open_log(task_id).map_err(spawn_err)?;
        let stderr = stdout.try_clone().map_err(spawn_err)?;

        let args = build_args(spec);
        debug!(task = %task_id, rsync = %self.rsync.display(), ?args, "launching rsync");

        let mut command = Command::new(&self.rsync);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        let child = ChildProcess::spawn(task_id, &mut command, exit_sink)?;
        Ok(Arc::new(child))
    }
}
