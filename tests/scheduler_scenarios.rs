//! End-to-end scheduling behaviour against in-memory processes and probes.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mirror_scheduler::core::{
    AdmissionController, AdmissionLimits, CommandSpec, Phase, Priority, Schedule, Scheduler,
    Signal, SystemSample, Task, DEFAULT_DEFER_SECS,
};
use mirror_scheduler::infra::{InMemoryLauncher, StaticProbe};
use mirror_scheduler::util::clock::{minute_window, ManualClock, UnixTime};

/// Tuesday 2023-11-14 22:13:20 UTC.
const NOW: UnixTime = 1_700_000_000;
/// First hourly boundary after `NOW`.
const NEXT_HOUR: UnixTime = 1_700_002_800;

struct Harness {
    scheduler: Scheduler,
    launcher: Arc<InMemoryLauncher>,
    probe: Arc<StaticProbe>,
    clock: Arc<ManualClock>,
}

fn hourly_task(id: &str, priority: u32) -> Task {
    Task::new(
        id,
        CommandSpec {
            source: format!("rsync://mirror.example.org/{id}/"),
            target: format!("/srv/mirror/{id}/"),
            ..CommandSpec::default()
        },
        Schedule::Interval {
            secs: 3600,
            offset: 0,
        },
    )
    .with_priority(Priority(priority))
}

fn harness(tasks: Vec<Task>, limits: AdmissionLimits) -> Harness {
    harness_with_launcher(tasks, limits, InMemoryLauncher::new())
}

fn harness_with_launcher(
    tasks: Vec<Task>,
    limits: AdmissionLimits,
    launcher: InMemoryLauncher,
) -> Harness {
    let launcher = Arc::new(launcher);
    let probe = Arc::new(StaticProbe::idle());
    let clock = Arc::new(ManualClock::new(NOW));
    let scheduler = Scheduler::new(
        tasks,
        AdmissionController::new(limits),
        launcher.clone(),
        probe.clone(),
        clock.clone(),
    );
    Harness {
        scheduler,
        launcher,
        probe,
        clock,
    }
}

impl Harness {
    /// Queue eligible tasks, move the clock, then run one wake + schedule pass.
    fn pass_at(&self, at: UnixTime) -> mirror_scheduler::core::ScheduleReport {
        self.scheduler.append_tasks();
        self.clock.set(at);
        let sample = self.scheduler.wake();
        self.scheduler.schedule(&sample)
    }
}

#[test]
fn test_overdue_task_dispatched_immediately() {
    let h = harness(vec![hourly_task("debian", 9)], AdmissionLimits::default());
    let report = h.pass_at(NEXT_HOUR + 5);

    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(report.dispatched[0].0, "debian");
    assert!(h.scheduler.is_running("debian"));
    assert_eq!(h.scheduler.queued_time("debian"), None);
    assert_eq!(h.launcher.launched(), vec!["debian".to_string()]);
}

#[test]
fn test_concurrency_ceiling_overrides_critical_priority() {
    let mut tasks: Vec<Task> = (0..10).map(|i| hourly_task(&format!("m{i:02}"), 9)).collect();
    tasks.push(hourly_task("z-critical", 1));
    let h = harness(tasks, AdmissionLimits::default());

    let report = h.pass_at(NEXT_HOUR);
    assert_eq!(report.dispatched.len(), 10);
    assert_eq!(h.scheduler.running_count(), 10);
    assert_eq!(
        report.deferred,
        vec![("z-critical".to_string(), NEXT_HOUR + DEFAULT_DEFER_SECS)]
    );
    assert!(!h.scheduler.is_running("z-critical"));
}

#[test]
fn test_high_load_defers_by_exactly_the_delay() {
    let h = harness(vec![hourly_task("debian", 9)], AdmissionLimits::default());
    h.probe.set(5.0, 0);

    let report = h.pass_at(NEXT_HOUR);
    assert!(report.dispatched.is_empty());
    assert_eq!(
        h.scheduler.queued_time("debian"),
        Some(NEXT_HOUR + DEFAULT_DEFER_SECS)
    );
    assert!(h.launcher.launched().is_empty());
}

#[test]
fn test_critical_priority_ignores_load_and_connections() {
    let h = harness(
        vec![hourly_task("security", 4), hourly_task("ubuntu", 5)],
        AdmissionLimits::default(),
    );
    h.probe.set(50.0, 10_000);

    let report = h.pass_at(NEXT_HOUR);
    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(report.dispatched[0].0, "security");
    assert_eq!(report.deferred[0].0, "ubuntu");
}

#[test]
fn test_repeated_deferral_is_monotonic() {
    let h = harness(vec![hourly_task("debian", 9)], AdmissionLimits::default());
    h.probe.set(9.0, 0);

    let mut previous = NEXT_HOUR;
    h.scheduler.append_tasks();
    for _ in 0..5 {
        h.clock.set(previous);
        let report = h.scheduler.schedule(&h.scheduler.wake());
        let next = h.scheduler.queued_time("debian").unwrap();
        assert_eq!(next, previous + DEFAULT_DEFER_SECS);
        assert_eq!(report.deferred, vec![("debian".to_string(), next)]);
        previous = next;
    }
}

#[test]
fn test_exit_for_unknown_pid_changes_nothing() {
    let h = harness(vec![hourly_task("debian", 9)], AdmissionLimits::default());
    h.pass_at(NEXT_HOUR);
    let before = h.scheduler.snapshot();

    assert_eq!(h.scheduler.handle().stop_task_by_process_id(424_242, 0), None);
    assert_eq!(h.scheduler.snapshot(), before);
}

#[test]
fn test_exit_makes_task_eligible_again() {
    let h = harness(vec![hourly_task("debian", 9)], AdmissionLimits::default());
    let report = h.pass_at(NEXT_HOUR);
    let pid = report.dispatched[0].1;

    // running tasks never sit in the queue
    assert_eq!(h.scheduler.append_tasks(), 0);

    assert!(h.launcher.finish(pid, 0));
    assert!(!h.scheduler.is_running("debian"));
    assert_eq!(h.scheduler.append_tasks(), 1);
    assert_eq!(h.scheduler.queued_time("debian"), Some(NEXT_HOUR));
}

#[test]
fn test_schedule_time_is_deterministic() {
    let task = Task::new(
        "debian",
        CommandSpec::default(),
        Schedule::Weekly {
            weekday: 6,
            hour: 3,
            min: 15,
        },
    );
    assert_eq!(task.get_schedule_time(NOW), task.get_schedule_time(NOW));
}

#[test]
fn test_pass_walks_in_time_order_and_stops_at_window_end() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let tasks: Vec<Task> = (0..40)
        .map(|i| {
            Task::new(
                format!("mirror-{i:02}"),
                CommandSpec::default(),
                Schedule::Interval {
                    secs: 7200,
                    offset: rng.random_range(0..7200),
                },
            )
        })
        .collect();
    let expected: Vec<(String, UnixTime)> = tasks
        .iter()
        .map(|t| (t.id().to_owned(), t.get_schedule_time(NOW)))
        .collect();
    let h = harness(
        tasks,
        AdmissionLimits {
            max_running: 1000,
            ..AdmissionLimits::default()
        },
    );

    let at = NOW + 3600;
    let report = h.pass_at(at);
    let (_, window_end) = minute_window(at);

    let mut due: Vec<&(String, UnixTime)> =
        expected.iter().filter(|(_, t)| *t < window_end).collect();
    due.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
    let due_ids: Vec<String> = due.iter().map(|(id, _)| id.clone()).collect();

    assert_eq!(report.inspected, due_ids);
    let dispatched: Vec<String> = report.dispatched.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(dispatched, due_ids);

    for (id, at) in &expected {
        if *at >= window_end {
            assert_eq!(h.scheduler.queued_time(id), Some(*at));
            assert!(!h.scheduler.is_running(id));
        }
    }
}

#[test]
fn test_running_and_queued_are_exclusive() {
    let tasks: Vec<Task> = (0..6).map(|i| hourly_task(&format!("m{i}"), 9)).collect();
    let h = harness(
        tasks,
        AdmissionLimits {
            max_running: 3,
            ..AdmissionLimits::default()
        },
    );
    h.pass_at(NEXT_HOUR);
    h.scheduler.append_tasks();

    let snapshot = h.scheduler.snapshot();
    assert_eq!(snapshot.running, 3);
    for task in &snapshot.tasks {
        assert!(!(task.running && task.queued_at.is_some()), "{task:?}");
        assert!(task.running || task.queued_at.is_some(), "{task:?}");
    }
}

#[test]
fn test_stop_all_tasks_signals_each_running_task() {
    let tasks: Vec<Task> = (0..3).map(|i| hourly_task(&format!("m{i}"), 9)).collect();
    let h = harness(tasks, AdmissionLimits::default());
    h.pass_at(NEXT_HOUR);
    assert_eq!(h.scheduler.running_count(), 3);

    let stopped = h.scheduler.shutdown(Signal::Terminate);
    assert_eq!(stopped, vec!["m0", "m1", "m2"]);
    assert_eq!(h.scheduler.running_count(), 0);
    assert_eq!(h.scheduler.phase(), Phase::ShuttingDown);
    assert!(h
        .launcher
        .signals()
        .iter()
        .all(|(_, signal)| *signal == Signal::Terminate));
}

#[test]
fn test_stop_task_sends_one_terminate_and_does_not_wait() {
    let h = harness_with_launcher(
        vec![hourly_task("debian", 9)],
        AdmissionLimits::default(),
        InMemoryLauncher::new().with_exit_on_signal(false),
    );
    let pid = h.pass_at(NEXT_HOUR).dispatched[0].1;

    let started = Instant::now();
    assert_eq!(h.scheduler.handle().stop_task("debian").unwrap(), Some(pid));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(h.launcher.signals(), vec![(pid, Signal::Terminate)]);

    // still running until the exit is reported
    assert!(h.scheduler.is_running("debian"));
    assert_eq!(h.scheduler.running_count(), 1);
    assert_eq!(h.scheduler.append_tasks(), 0);

    assert!(h.launcher.finish(pid, 143));
    assert!(!h.scheduler.is_running("debian"));
    assert_eq!(h.scheduler.append_tasks(), 1);
}

#[test]
fn test_stop_task_on_idle_task_is_noop() {
    let h = harness(vec![hourly_task("debian", 9)], AdmissionLimits::default());
    h.scheduler.append_tasks();
    let before = h.scheduler.snapshot();

    assert_eq!(h.scheduler.handle().stop_task("debian").unwrap(), None);
    assert!(h.launcher.signals().is_empty());
    assert_eq!(h.scheduler.snapshot(), before);
}

#[test]
fn test_stop_task_on_unknown_id_is_noop() {
    let h = harness(vec![hourly_task("debian", 9)], AdmissionLimits::default());
    h.pass_at(NEXT_HOUR);

    assert_eq!(h.scheduler.handle().stop_task("no-such-mirror").unwrap(), None);
    assert!(h.launcher.signals().is_empty());
    assert!(h.scheduler.is_running("debian"));
}

#[test]
fn test_loop_runs_until_shutdown_request() {
    let launcher = Arc::new(InMemoryLauncher::new());
    let clock = Arc::new(ManualClock::new(NEXT_HOUR));
    let scheduler = Arc::new(
        Scheduler::new(
            vec![hourly_task("debian", 9)],
            AdmissionController::default(),
            launcher.clone(),
            Arc::new(StaticProbe::idle()),
            clock,
        )
        .with_idle_sleep(Duration::from_millis(10)),
    );

    let worker = {
        let scheduler = Arc::clone(&scheduler);
        thread::spawn(move || scheduler.run())
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while launcher.launched().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(launcher.launched(), vec!["debian".to_string()]);

    scheduler.handle().request_shutdown();
    worker.join().unwrap();

    assert_eq!(scheduler.phase(), Phase::ShuttingDown);
    assert_eq!(scheduler.running_count(), 0);
    assert_eq!(launcher.signals().len(), 1);
}

#[test]
fn test_wake_samples_probe() {
    let h = harness(Vec::new(), AdmissionLimits::default());
    h.probe.set(1.5, 7);
    assert_eq!(
        h.scheduler.wake(),
        SystemSample {
            load_average: 1.5,
            connections: 7
        }
    );
}
