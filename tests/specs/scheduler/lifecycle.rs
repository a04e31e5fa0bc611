//! Job lifecycle specs
//!
//! Verify scheduling, completion, cancellation, failure and shutdown of real
//! jobs.

use crate::prelude::*;

#[test]
fn scheduled_job_completes() {
    let m = manager(2);
    let handle = m.schedule(job_fn("hello", |_| JobStatus::Ok)).unwrap();

    assert_eq!(handle.join_timeout(WAIT), Some(JobStatus::Ok));
    assert_eq!(handle.state(), JobState::Done);
    assert_eq!(handle.result(), Some(JobStatus::Ok));
}

#[test]
fn job_status_is_reported_through_the_handle() {
    let m = manager(1);
    let handle = m
        .schedule(job_fn("lint", |_| JobStatus::Error("3 warnings".to_string())))
        .unwrap();

    assert_eq!(
        handle.join_timeout(WAIT),
        Some(JobStatus::Error("3 warnings".to_string()))
    );
}

#[test]
fn panicking_job_reports_error_and_frees_its_rule() {
    let m = manager(1);
    let handle = m
        .schedule(
            job_fn("explode", |_| -> JobStatus { panic!("kaboom") })
                .with_rule(Rule::exclusive("x")),
        )
        .unwrap();

    let status = handle.join_timeout(WAIT).unwrap();
    assert!(matches!(&status, JobStatus::Error(msg) if msg.contains("kaboom")));

    let after = Holder::spawn(&m, Rule::exclusive("x"));
    assert!(after.admitted_within(WAIT));
    after.release().unwrap();
}

#[test]
fn cancelling_a_pending_job_prevents_it_from_running() {
    let m = manager(1);
    let (busy, gate) = gated_job("busy", Rule::none());
    let busy = m.schedule(busy).unwrap();
    gate.started.recv_timeout(WAIT).unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    let victim = {
        let ran = Arc::clone(&ran);
        m.schedule(job_fn("victim", move |_| {
            ran.fetch_add(1, Ordering::SeqCst);
            JobStatus::Ok
        }))
        .unwrap()
    };
    assert_eq!(victim.state(), JobState::Pending);
    assert!(victim.cancel());

    gate.open.send(()).unwrap();
    assert_eq!(busy.join_timeout(WAIT), Some(JobStatus::Ok));
    assert_eq!(victim.join_timeout(WAIT), Some(JobStatus::Cancelled));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn cancelling_a_running_job_is_cooperative() {
    let m = manager(1);
    let (started_tx, started_rx) = mpsc::channel();
    let handle = m
        .schedule(job_fn("poll", move |ctx| {
            let _ = started_tx.send(());
            let deadline = std::time::Instant::now() + WAIT;
            while std::time::Instant::now() < deadline {
                if ctx.is_cancelled() {
                    return JobStatus::Cancelled;
                }
                thread::sleep(Duration::from_millis(1));
            }
            JobStatus::Ok
        }))
        .unwrap();

    started_rx.recv_timeout(WAIT).unwrap();
    assert!(!handle.cancel());
    assert_eq!(handle.join_timeout(WAIT), Some(JobStatus::Cancelled));
}

#[test]
fn urgent_jobs_jump_the_queue() {
    let m = manager(1);
    let (busy, gate) = gated_job("busy", Rule::none());
    let busy = m.schedule(busy).unwrap();
    gate.started.recv_timeout(WAIT).unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let queue = |name: &'static str, priority: JobPriority| {
        let order = Arc::clone(&order);
        m.schedule(
            job_fn(name, move |_| {
                order.lock().unwrap().push(name);
                JobStatus::Ok
            })
            .with_priority(priority),
        )
        .unwrap()
    };
    let handles = [
        queue("long", JobPriority::Long),
        queue("short", JobPriority::Short),
        queue("interactive", JobPriority::Interactive),
    ];

    gate.open.send(()).unwrap();
    busy.join_timeout(WAIT).unwrap();
    for h in &handles {
        assert_eq!(h.join_timeout(WAIT), Some(JobStatus::Ok));
    }
    assert_eq!(*order.lock().unwrap(), vec!["interactive", "short", "long"]);
}

#[test]
fn shutdown_cancels_what_never_started() {
    let m = manager(1);
    m.begin(Rule::path("/repo"));
    let stuck = m
        .schedule(job_fn("commit", |_| JobStatus::Ok).with_rule(Rule::path("/repo/.git")))
        .unwrap();

    m.shutdown();
    assert_eq!(stuck.join_timeout(WAIT), Some(JobStatus::Cancelled));
    assert!(matches!(
        m.schedule(job_fn("late", |_| JobStatus::Ok)),
        Err(JobError::ShutDown)
    ));
    m.end().unwrap();
}

#[test]
fn lifecycle_events_reach_subscribers() {
    let m = manager(1);
    let mut rx = m.subscribe(&["job:**"]);

    let handle = m.schedule(job_fn("observed", |_| JobStatus::Ok)).unwrap();
    handle.join_timeout(WAIT).unwrap();

    let mut seen: Vec<&str> = (0..3)
        .filter_map(|_| rx.blocking_recv())
        .map(|e| e.name())
        .collect();
    seen.sort();
    assert_eq!(seen, vec!["job:admitted", "job:done", "job:scheduled"]);
}
