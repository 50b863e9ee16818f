//! Tests for configuration loading and validation

use mirror_scheduler::config::{GeneralConfig, MirrorConfig, TaskOptions};
use mirror_scheduler::core::{CommandSpec, Priority, Schedule, SchedulerError};

fn options(schedule: Schedule) -> TaskOptions {
    TaskOptions {
        command: CommandSpec {
            source: "rsync://mirror.example.org/debian/".to_string(),
            target: "/srv/debian/".to_string(),
            ..CommandSpec::default()
        },
        schedule,
        priority: Priority::DEFAULT,
        enabled: true,
    }
}

#[test]
fn test_general_config_validation() {
    assert!(GeneralConfig::default().validate().is_ok());
}

#[test]
fn test_general_config_invalid_load_limit() {
    let invalid = GeneralConfig {
        load_limit: 0.0,
        ..GeneralConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_general_config_invalid_max_tasks() {
    let invalid = GeneralConfig {
        max_tasks: 0,
        ..GeneralConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_task_options_validation() {
    assert!(options(Schedule::Hourly { min: 15 }).validate().is_ok());
    assert!(options(Schedule::Interval { secs: 0, offset: 0 })
        .validate()
        .is_err());

    let mut no_target = options(Schedule::Hourly { min: 15 });
    no_target.command.target.clear();
    assert!(no_target.validate().is_err());
}

#[test]
fn test_mirror_config_validation_names_task() {
    let mut config = MirrorConfig::default();
    config
        .tasks
        .insert("bad".to_string(), options(Schedule::Daily { hour: 24, min: 0 }));
    let err = config.validate().unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidTask { ref task, .. } if task == "bad"));
}

#[test]
fn test_task_options_full_section() {
    let raw = r#"{
        "source": "rsync://mirror.example.org/fedora/",
        "target": "/srv/fedora/",
        "args": ["--bwlimit=5000"],
        "exclude": ["*.iso", ".~tmp~"],
        "password_file": "/etc/rsync.pass",
        "timeout_secs": 900,
        "schedule": {"type": "weekly", "weekday": 0, "hour": 5, "min": 0},
        "priority": 2,
        "enabled": false
    }"#;
    let parsed: TaskOptions = serde_json::from_str(raw).unwrap();
    assert_eq!(parsed.command.exclude.len(), 2);
    assert_eq!(parsed.command.password_file.as_deref(), Some("/etc/rsync.pass"));
    assert_eq!(parsed.command.timeout_secs, Some(900));
    assert_eq!(
        parsed.schedule,
        Schedule::Weekly {
            weekday: 0,
            hour: 5,
            min: 0
        }
    );
    assert!(parsed.priority.is_critical());
    assert!(!parsed.enabled);
}

#[test]
fn test_config_from_file() {
    let path = std::env::temp_dir().join(format!("mirrord-config-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{"general": {"httpconn": "300"}, "gnu": {"source": "a", "target": "b", "schedule": {"type": "hourly", "min": 0}}}"#,
    )
    .unwrap();

    let config = MirrorConfig::from_file(&path).unwrap();
    assert_eq!(config.general.http_conn, 300);
    assert_eq!(config.general.admission_limits().max_connections, 300);
    assert!(config.tasks.contains_key("gnu"));

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_config_from_missing_file() {
    let err = MirrorConfig::from_file("/nonexistent/mirror.json").unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
}
