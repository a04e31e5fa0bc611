//! Admission specs
//!
//! Verify that conflicting rules are never held at the same time and that
//! disjoint rules are.

use crate::prelude::*;

#[test]
fn conflicting_implicit_scopes_serialize() {
    let m = manager(1);
    let first = Holder::spawn(&m, Rule::path("/proj"));
    assert!(first.admitted_within(WAIT));

    let second = Holder::spawn(&m, Rule::path("/proj/src/main.rs"));
    assert!(!second.admitted_within(BRIEF));

    first.release().unwrap();
    assert!(second.admitted_within(WAIT));
    second.release().unwrap();
}

#[test]
fn disjoint_implicit_scopes_overlap() {
    let m = manager(1);
    let a = Holder::spawn(&m, Rule::path("/proj/a"));
    let b = Holder::spawn(&m, Rule::path("/proj/b"));

    assert!(a.admitted_within(WAIT));
    assert!(b.admitted_within(WAIT));
    assert_eq!(m.implicit_jobs().live_count(), 2);

    a.release().unwrap();
    b.release().unwrap();
    assert_eq!(m.implicit_jobs().live_count(), 0);
}

#[test]
fn running_job_blocks_conflicting_scope() {
    let m = manager(1);
    let (job, gate) = gated_job("index", Rule::exclusive("index"));
    let handle = m.schedule(job).unwrap();
    gate.started.recv_timeout(WAIT).unwrap();

    let waiter = Holder::spawn(&m, Rule::exclusive("index"));
    assert!(!waiter.admitted_within(BRIEF));

    gate.open.send(()).unwrap();
    assert_eq!(handle.join_timeout(WAIT), Some(JobStatus::Ok));
    assert!(waiter.admitted_within(WAIT));
    waiter.release().unwrap();
}

#[test]
fn multi_rule_conflicts_with_any_member() {
    let m = manager(1);
    let both = MultiRule::combine([Rule::path("/a"), Rule::path("/b")]);
    let holder = Holder::spawn(&m, both);
    assert!(holder.admitted_within(WAIT));

    let other = Holder::spawn(&m, Rule::path("/b/file"));
    assert!(!other.admitted_within(BRIEF));
    let free = Holder::spawn(&m, Rule::path("/c"));
    assert!(free.admitted_within(WAIT));

    holder.release().unwrap();
    assert!(other.admitted_within(WAIT));
    other.release().unwrap();
    free.release().unwrap();
}

#[test]
fn no_rule_never_waits() {
    let m = manager(1);
    let hog = Holder::spawn(&m, Rule::exclusive("everything"));
    assert!(hog.admitted_within(WAIT));

    let free = Holder::spawn(&m, Rule::none());
    assert!(free.admitted_within(WAIT));

    free.release().unwrap();
    hog.release().unwrap();
}

#[test]
fn many_threads_on_one_rule_take_turns() {
    let m = manager(1);
    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let m = Arc::clone(&m);
            let inside = Arc::clone(&inside);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                m.with_rule(Rule::path("/shared"), || {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap().unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(m.scheduler().running_count(), 0);
}
