//! Tests for the daemon entry point

use mirror_scheduler::runtime::run_daemon;

#[test]
fn test_run_daemon_missing_config() {
    let err = run_daemon("/nonexistent/mirrord/mirror.json").unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/mirrord/mirror.json"));
}

#[test]
fn test_run_daemon_invalid_config() {
    let path = std::env::temp_dir().join(format!("mirrord-invalid-{}.json", std::process::id()));
    std::fs::write(&path, "[]").unwrap();

    let err = run_daemon(&path).unwrap_err();
    assert!(format!("{err:#}").contains("config error"));

    std::fs::remove_file(&path).unwrap();
}
