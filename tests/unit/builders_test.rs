//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use mirror_scheduler::builders::SchedulerBuilder;
use mirror_scheduler::config::MirrorConfig;
use mirror_scheduler::core::{SchedulerError, DEFAULT_DEFER_SECS};
use mirror_scheduler::infra::{InMemoryLauncher, StaticProbe};
use mirror_scheduler::util::clock::ManualClock;

const CONFIG: &str = r#"{
    "general": {"loadlimit": 2.0, "httpconn": 100, "maxtasks": 4},
    "debian": {"source": "a", "target": "b", "schedule": {"type": "interval", "secs": 3600}},
    "ubuntu": {"source": "c", "target": "d", "schedule": {"type": "hourly", "min": 30}, "priority": 1}
}"#;

fn builder() -> SchedulerBuilder {
    SchedulerBuilder::new(MirrorConfig::from_json_str(CONFIG).unwrap())
        .with_launcher(Arc::new(InMemoryLauncher::new()))
        .with_probe(Arc::new(StaticProbe::idle()))
        .with_clock(Arc::new(ManualClock::new(1_700_000_000)))
}

#[test]
fn test_builder_applies_general_limits() {
    let scheduler = builder().build().unwrap();
    let limits = scheduler.admission().limits();
    assert!((limits.max_load - 2.0).abs() < f64::EPSILON);
    assert_eq!(limits.max_connections, 100);
    assert_eq!(limits.max_running, 4);
}

#[test]
fn test_builder_loads_tasks() {
    let scheduler = builder()
        .with_idle_sleep(Duration::from_millis(50))
        .build()
        .unwrap();
    let snapshot = scheduler.snapshot();
    let ids: Vec<_> = snapshot.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["debian", "ubuntu"]);
    assert_eq!(snapshot.tasks[1].priority, 1);
}

#[test]
fn test_builder_custom_defer_delay() {
    let scheduler = builder().with_defer_delay(60).build().unwrap();
    scheduler.append_tasks();
    let queued = scheduler.queued_time("debian").unwrap();
    assert_eq!(scheduler.defer_task("debian"), Some(queued + 60));
}

#[test]
fn test_builder_default_defer_delay() {
    let scheduler = builder().build().unwrap();
    scheduler.append_tasks();
    let queued = scheduler.queued_time("ubuntu").unwrap();
    assert_eq!(
        scheduler.defer_task("ubuntu"),
        Some(queued + DEFAULT_DEFER_SECS)
    );
}

#[test]
fn test_builder_rejects_zero_defer_delay() {
    let err = builder().with_defer_delay(0).build().unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
}

#[test]
fn test_builder_rejects_invalid_task() {
    let config = MirrorConfig::from_json_str(
        r#"{"bad": {"source": "", "target": "b", "schedule": {"type": "hourly", "min": 0}}}"#,
    )
    .unwrap();
    let err = SchedulerBuilder::new(config)
        .with_launcher(Arc::new(InMemoryLauncher::new()))
        .build()
        .unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidTask { .. }));
}
