// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker threads that run admitted real jobs

use super::scheduler::Scheduler;
use crate::clock::Clock;
use crate::error::JobError;
use crate::event::{thread_label, Event};
use crate::events::EventBus;
use crate::id::JobId;
use crate::job::{JobRecord, JobStatus};
use crate::rule::Rule;
use dashmap::DashMap;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// The real job a worker thread is currently running
#[derive(Clone, Debug)]
pub(crate) struct CurrentJob {
    pub(crate) id: JobId,
    pub(crate) rule: Rule,
}

pub(crate) type CurrentJobs = DashMap<ThreadId, CurrentJob>;

/// Rule scopes a job body opened and never closed
pub(crate) trait OpenScopes: Send + Sync {
    fn abandon(&self, thread: ThreadId);
}

pub(crate) struct Worker<C: Clock> {
    scheduler: Arc<Scheduler>,
    current: Arc<CurrentJobs>,
    scopes: Arc<dyn OpenScopes>,
    events: EventBus,
    clock: C,
}

impl<C: Clock> Worker<C> {
    pub(crate) fn new(
        scheduler: Arc<Scheduler>,
        current: Arc<CurrentJobs>,
        scopes: Arc<dyn OpenScopes>,
        events: EventBus,
        clock: C,
    ) -> Self {
        Self {
            scheduler,
            current,
            scopes,
            events,
            clock,
        }
    }

    pub(crate) fn spawn(self, name: String) -> Result<JoinHandle<()>, JobError> {
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || self.run())?;
        Ok(handle)
    }

    /// Run jobs until the scheduler shuts down
    fn run(&self) {
        let thread = thread::current().id();
        tracing::debug!(thread = ?thread, "worker started");
        while let Some(record) = self.scheduler.next_ready(thread) {
            self.execute(thread, &record);
        }
        tracing::debug!(thread = ?thread, "worker stopped");
    }

    fn execute(&self, thread: ThreadId, record: &JobRecord) {
        let span = tracing::info_span!("job.run", job = %record.id(), name = record.name());
        let _guard = span.enter();

        if let Err(e) = record.mark_running() {
            tracing::error!(error = %e, "admitted job was not pending");
        }
        self.events.publish(Event::JobAdmitted {
            id: record.id().clone(),
            thread: thread_label(thread),
        });

        self.current.insert(
            thread,
            CurrentJob {
                id: record.id().clone(),
                rule: record.rule().clone(),
            },
        );

        let start = self.clock.now();
        let status = match record.take_work() {
            Some(_) if record.is_cancel_requested() => JobStatus::Cancelled,
            Some(mut job) => {
                let ctx = record.context();
                panic::catch_unwind(AssertUnwindSafe(|| job.run(&ctx)))
                    .unwrap_or_else(|payload| JobStatus::Error(panic_message(payload.as_ref())))
            }
            None => JobStatus::Error("job work already taken".to_string()),
        };

        self.scopes.abandon(thread);
        self.current.remove(&thread);
        self.scheduler.release(record.id());

        let elapsed_ms =
            u64::try_from(self.clock.elapsed_since(start).as_millis()).unwrap_or(u64::MAX);
        match &status {
            JobStatus::Error(msg) => tracing::error!(elapsed_ms, error = %msg, "job failed"),
            other => tracing::info!(elapsed_ms, status = %other, "job finished"),
        }

        if let Err(e) = record.finish(status.clone()) {
            tracing::error!(error = %e, "finishing job");
        }
        self.events.publish(Event::JobDone {
            id: record.id().clone(),
            status,
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("job panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("job panicked: {}", s)
    } else {
        "job panicked".to_string()
    }
}
