// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared record of a scheduled job and the caller-facing handle

use super::definition::{Job, JobContext};
use super::state::{JobPriority, JobState, JobStatus};
use crate::engine::Scheduler;
use crate::error::JobError;
use crate::id::JobId;
use crate::rule::Rule;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct Progress {
    state: JobState,
    status: Option<JobStatus>,
}

/// State shared between the scheduler, the worker running the job and handles
pub(crate) struct JobRecord {
    id: JobId,
    name: String,
    rule: Rule,
    priority: JobPriority,
    cancelled: Arc<AtomicBool>,
    work: Mutex<Option<Box<dyn Job>>>,
    progress: Mutex<Progress>,
    finished: Condvar,
}

impl JobRecord {
    pub(crate) fn new(id: JobId, job: Box<dyn Job>) -> Self {
        Self {
            name: job.name().to_string(),
            rule: job.rule(),
            priority: job.priority(),
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
            work: Mutex::new(Some(job)),
            progress: Mutex::new(Progress {
                state: JobState::Pending,
                status: None,
            }),
            finished: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> &JobId {
        &self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn rule(&self) -> &Rule {
        &self.rule
    }

    pub(crate) fn priority(&self) -> JobPriority {
        self.priority
    }

    pub(crate) fn context(&self) -> JobContext {
        JobContext::new(self.id.clone(), Arc::clone(&self.cancelled))
    }

    pub(crate) fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn take_work(&self) -> Option<Box<dyn Job>> {
        self.work.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn state(&self) -> JobState {
        self.progress().state
    }

    pub(crate) fn status(&self) -> Option<JobStatus> {
        self.progress().status.clone()
    }

    pub(crate) fn mark_running(&self) -> Result<(), JobError> {
        let mut progress = self.progress();
        self.advance(&mut progress, JobState::Running)
    }

    /// Move to `Done` with `status` and wake every joiner
    pub(crate) fn finish(&self, status: JobStatus) -> Result<(), JobError> {
        let mut progress = self.progress();
        self.advance(&mut progress, JobState::Done)?;
        progress.status = Some(status);
        self.finished.notify_all();
        Ok(())
    }

    fn advance(&self, progress: &mut Progress, next: JobState) -> Result<(), JobError> {
        if !progress.state.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: progress.state,
                to: next,
            });
        }
        progress.state = next;
        Ok(())
    }

    pub(crate) fn wait_finished(&self, timeout: Option<Duration>) -> Option<JobStatus> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut progress = self.progress();
        loop {
            if let Some(status) = &progress.status {
                return Some(status.clone());
            }
            progress = match deadline {
                None => self
                    .finished
                    .wait(progress)
                    .unwrap_or_else(|e| e.into_inner()),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return None;
                    }
                    let (guard, _) = self
                        .finished
                        .wait_timeout(progress, remaining)
                        .unwrap_or_else(|e| e.into_inner());
                    guard
                }
            };
        }
    }
}

/// Caller's handle to a scheduled job
#[derive(Clone)]
pub struct JobHandle {
    record: Arc<JobRecord>,
    scheduler: Arc<Scheduler>,
}

impl JobHandle {
    pub(crate) fn new(record: Arc<JobRecord>, scheduler: Arc<Scheduler>) -> Self {
        Self { record, scheduler }
    }

    pub fn id(&self) -> &JobId {
        self.record.id()
    }

    pub fn name(&self) -> &str {
        self.record.name()
    }

    pub fn rule(&self) -> &Rule {
        self.record.rule()
    }

    pub fn state(&self) -> JobState {
        self.record.state()
    }

    /// Status once the job is done
    pub fn result(&self) -> Option<JobStatus> {
        self.record.status()
    }

    /// Cancel the job
    ///
    /// A pending job is removed from the queue and finishes as `Cancelled`
    /// without running. A running job only sees the request through
    /// [`JobContext::is_cancelled`]. Returns true if the job was still pending.
    pub fn cancel(&self) -> bool {
        self.record.request_cancel();
        self.scheduler.cancel_pending(self.record.id())
    }

    /// Block until the job is done
    pub fn join(&self) -> JobStatus {
        self.record
            .wait_finished(None)
            .unwrap_or(JobStatus::Cancelled)
    }

    /// Block until the job is done or `timeout` elapses
    pub fn join_timeout(&self, timeout: Duration) -> Option<JobStatus> {
        self.record.wait_finished(Some(timeout))
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", self.record.id())
            .field("name", &self.record.name())
            .field("state", &self.record.state())
            .finish()
    }
}
