//! Implicit scope nesting specs
//!
//! Verify the begin/end protocol: only the outermost begin blocks, the
//! registry empties on balance, and misuse is reported to the caller.

use crate::prelude::*;

#[test]
fn balanced_nesting_releases_everything() {
    let m = manager(1);
    m.begin(Rule::path("/ws"));
    m.begin(Rule::path("/ws/pkg"));
    m.begin(Rule::path("/ws/pkg/src"));
    assert_eq!(m.implicit_jobs().open_depth(), 3);

    for _ in 0..3 {
        m.end().unwrap();
    }
    assert_eq!(m.implicit_jobs().live_count(), 0);
    assert_eq!(m.scheduler().running_count(), 0);
}

#[test]
fn unmatched_end_is_rejected() {
    let m = manager(1);
    let err = m.end().unwrap_err();
    assert_eq!(err.violation(), Some(ProtocolViolation::UnmatchedEnd));
}

#[test]
fn unmatched_end_does_not_disturb_other_threads() {
    let m = manager(1);
    let holder = Holder::spawn(&m, Rule::exclusive("cache"));
    assert!(holder.admitted_within(WAIT));

    assert!(m.end().is_err());
    assert_eq!(m.implicit_jobs().live_count(), 1);
    assert_eq!(m.scheduler().running_count(), 1);

    holder.release().unwrap();
}

#[test]
fn nested_scope_does_not_wait_for_conflicting_holder() {
    let m = manager(1);
    m.begin(Rule::path("/x"));

    let other = Holder::spawn(&m, Rule::path("/y"));
    assert!(other.admitted_within(WAIT));

    // Not contained by /x and held elsewhere, yet returns at once
    m.begin(Rule::path("/y/z"));
    assert_eq!(m.implicit_jobs().open_depth(), 2);

    m.end().unwrap();
    m.end().unwrap();
    other.release().unwrap();
}

#[test]
fn second_thread_is_admitted_once_the_first_leaves() {
    let m = manager(1);
    let t1 = Holder::spawn(&m, Rule::path("/shared/a"));
    assert!(t1.admitted_within(WAIT));

    let t2 = Holder::spawn(&m, Rule::path("/shared"));
    assert!(!t2.admitted_within(BRIEF));
    assert_eq!(m.implicit_jobs().live_count(), 2);

    t1.release().unwrap();
    assert!(t2.admitted_within(WAIT));
    assert_eq!(m.implicit_jobs().live_count(), 1);

    t2.release().unwrap();
    assert_eq!(m.implicit_jobs().live_count(), 0);
}

#[test]
fn with_rule_returns_the_closure_value() {
    let m = manager(1);
    let sum = m.with_rule(Rule::exclusive("math"), || 2 + 2).unwrap();
    assert_eq!(sum, 4);
    assert_eq!(m.implicit_jobs().open_depth(), 0);
}

#[test]
fn panicking_scope_body_still_releases_the_rule() {
    let m = manager(1);
    let crashed = {
        let m = Arc::clone(&m);
        thread::spawn(move || {
            m.with_rule(Rule::exclusive("ledger"), || -> usize { panic!("bad entry") })
        })
    };
    assert!(crashed.join().is_err());
    assert_eq!(m.implicit_jobs().live_count(), 0);

    let next = Holder::spawn(&m, Rule::exclusive("ledger"));
    assert!(next.admitted_within(WAIT));
    next.release().unwrap();
}

#[test]
fn scope_events_track_depth() {
    let m = manager(1);
    let mut rx = m.subscribe(&["implicit:*"]);

    m.begin(Rule::path("/a"));
    m.begin(Rule::path("/a/b"));
    m.end().unwrap();
    m.end().unwrap();

    let depths: Vec<usize> = drain(&mut rx)
        .into_iter()
        .map(|e| match e {
            Event::ImplicitBegin { depth, .. } | Event::ImplicitEnd { depth, .. } => depth,
            other => panic!("unexpected event {:?}", other),
        })
        .collect();
    assert_eq!(depths, vec![1, 2, 1, 0]);
}

#[test]
fn protocol_violations_are_published() {
    let m = manager(1);
    let mut rx = m.subscribe(&["protocol:violation"]);
    let _ = m.end();

    assert_eq!(names(&drain(&mut rx)), vec!["protocol:violation"]);
}
