//! Rule inheritance specs
//!
//! A thread already running a real job inherits that job's rule for any
//! scope it opens, so nested scopes inside job bodies never self-deadlock.

use crate::prelude::*;

#[test]
fn job_body_can_open_narrower_scope() {
    let m = manager(2);
    let inner = Arc::clone(&m);

    let handle = m
        .schedule(
            job_fn("refactor", move |_| {
                let result = inner.with_rule(Rule::path("/proj/src/lib.rs"), || {
                    inner.current_rule().map(|r| r.is_inherited())
                });
                match result {
                    Ok(Some(true)) => JobStatus::Ok,
                    Ok(other) => JobStatus::Error(format!("effective rule: {:?}", other)),
                    Err(e) => JobStatus::Error(e.to_string()),
                }
            })
            .with_rule(Rule::path("/proj")),
        )
        .unwrap();

    assert_eq!(handle.join_timeout(WAIT), Some(JobStatus::Ok));
    assert_eq!(m.implicit_jobs().live_count(), 0);
}

#[test]
fn inherited_scope_releases_nothing() {
    let m = manager(1);
    let inner = Arc::clone(&m);

    let handle = m
        .schedule(
            job_fn("build", move |ctx| {
                inner.begin(Rule::path("/out"));
                if let Err(e) = inner.end() {
                    return JobStatus::Error(e.to_string());
                }
                // The job's own admission survives its nested scopes
                if inner.scheduler().is_running(ctx.id()) {
                    JobStatus::Ok
                } else {
                    JobStatus::Error("job lost its rule".to_string())
                }
            })
            .with_rule(Rule::path("/out")),
        )
        .unwrap();

    assert_eq!(handle.join_timeout(WAIT), Some(JobStatus::Ok));
}

#[test]
fn job_without_rule_requests_its_own() {
    let m = manager(1);
    let inner = Arc::clone(&m);

    let handle = m
        .schedule(job_fn("free", move |_| {
            let owned = inner.with_rule(Rule::exclusive("net"), || {
                inner.current_rule().map(|r| !r.is_inherited())
            });
            match owned {
                Ok(Some(true)) => JobStatus::Ok,
                other => JobStatus::Error(format!("{:?}", other.map_err(|e| e.to_string()))),
            }
        }))
        .unwrap();

    assert_eq!(handle.join_timeout(WAIT), Some(JobStatus::Ok));
}

#[test]
fn current_job_is_visible_inside_job_body() {
    let m = manager(1);
    let inner = Arc::clone(&m);

    let handle = m
        .schedule(job_fn("whoami", move |ctx| {
            if inner.current_job().as_ref() == Some(ctx.id()) {
                JobStatus::Ok
            } else {
                JobStatus::Error("current job mismatch".to_string())
            }
        }))
        .unwrap();

    assert_eq!(handle.join_timeout(WAIT), Some(JobStatus::Ok));
    assert_eq!(m.current_job(), None);
}
