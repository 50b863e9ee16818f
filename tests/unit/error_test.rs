//! Tests for error types

use mirror_scheduler::core::SchedulerError;

#[test]
fn test_already_running_error() {
    let err = SchedulerError::AlreadyRunning("debian".to_string());
    assert_eq!(format!("{}", err), "task already running: debian");
}

#[test]
fn test_transfer_tool_not_found_error() {
    let err = SchedulerError::TransferToolNotFound("rsync".to_string());
    assert_eq!(
        format!("{}", err),
        "rsync not found in PATH, please install rsync"
    );
}

#[test]
fn test_invalid_task_error() {
    let err = SchedulerError::InvalidTask {
        task: "ubuntu".to_string(),
        reason: "source must not be empty".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "invalid task ubuntu: source must not be empty"
    );
}

#[test]
fn test_spawn_error_keeps_source() {
    use std::error::Error;

    let err = SchedulerError::Spawn {
        task: "debian".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
    };
    assert!(format!("{}", err).starts_with("failed to spawn task debian"));
    assert!(err.source().is_some());
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: SchedulerError = io.into();
    assert!(matches!(err, SchedulerError::Io(_)));
}
