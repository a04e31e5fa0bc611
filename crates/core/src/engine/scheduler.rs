// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission authority for real and implicit jobs
//!
//! The scheduler owns the set of running `(job, rule, thread)` entries and
//! the queue of pending real jobs. A job is admitted only when no running
//! entry's rule conflicts with its own. Every release broadcasts on a single
//! condvar; each waiter (implicit job or idle worker) re-checks its own
//! admission, since waiters may or may not conflict with each other.

use crate::error::JobError;
use crate::event::Event;
use crate::events::EventBus;
use crate::id::JobId;
use crate::job::{JobRecord, JobStatus};
use crate::rule::Rule;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::ThreadId;
use std::time::Duration;

#[derive(Clone, Debug)]
struct RunningJob {
    rule: Rule,
    thread: ThreadId,
}

#[derive(Default)]
struct SchedulerState {
    running: HashMap<JobId, RunningJob>,
    /// Sorted by priority, FIFO within a priority
    pending: Vec<Arc<JobRecord>>,
    shut_down: bool,
}

impl SchedulerState {
    fn conflicts(&self, rule: &Rule) -> bool {
        self.running.values().any(|r| r.rule.conflicts_with(rule))
    }

    fn admit(&mut self, job: &JobId, rule: &Rule, thread: ThreadId) -> bool {
        if self.running.contains_key(job) {
            return true;
        }
        if self.conflicts(rule) {
            return false;
        }
        self.running.insert(
            job.clone(),
            RunningJob {
                rule: rule.clone(),
                thread,
            },
        );
        true
    }

    /// Threads other than `thread` whose running rules conflict with `rule`
    fn blockers(&self, rule: &Rule, thread: ThreadId) -> Vec<ThreadId> {
        let mut threads = Vec::new();
        for r in self.running.values() {
            if r.thread != thread && r.rule.conflicts_with(rule) && !threads.contains(&r.thread) {
                threads.push(r.thread);
            }
        }
        threads
    }

    fn first_admissible(&self) -> Option<usize> {
        self.pending.iter().position(|p| !self.conflicts(p.rule()))
    }
}

pub struct Scheduler {
    state: Mutex<SchedulerState>,
    wake: Condvar,
    events: EventBus,
}

impl Scheduler {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
            wake: Condvar::new(),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit `job` if no running rule conflicts with `rule`
    ///
    /// On success the job is recorded as running on `thread` in the same
    /// critical section as the conflict check. Admitting a job that is
    /// already running succeeds without change.
    pub fn try_admit(&self, job: &JobId, rule: &Rule, thread: ThreadId) -> bool {
        self.lock().admit(job, rule, thread)
    }

    /// Block the calling thread until `job` is admitted
    ///
    /// `about_to_wait` runs before every suspension with the threads holding
    /// conflicting rules. It is called with the scheduler lock held and must
    /// not call back into the scheduler. Wake-ups (broadcast, timeout after
    /// `slice`, or spurious) only lead to a re-check; the wait is never
    /// abandoned.
    pub fn wait_for_admission(
        &self,
        job: &JobId,
        rule: &Rule,
        thread: ThreadId,
        slice: Duration,
        mut about_to_wait: impl FnMut(&[ThreadId]),
    ) {
        let mut state = self.lock();
        loop {
            if state.admit(job, rule, thread) {
                return;
            }
            let blockers = state.blockers(rule, thread);
            about_to_wait(&blockers);
            let (next, _) = self
                .wake
                .wait_timeout(state, slice)
                .unwrap_or_else(|e| e.into_inner());
            state = next;
        }
    }

    /// Remove `job` from the running set and wake every waiter
    ///
    /// Returns false if the job was not running.
    pub fn release(&self, job: &JobId) -> bool {
        let removed = self.lock().running.remove(job).is_some();
        if removed {
            self.wake.notify_all();
        }
        removed
    }

    /// Queue a real job for a worker
    pub(crate) fn enqueue(&self, record: Arc<JobRecord>) -> Result<(), JobError> {
        let mut state = self.lock();
        if state.shut_down {
            return Err(JobError::ShutDown);
        }
        let at = state
            .pending
            .iter()
            .position(|p| p.priority() > record.priority())
            .unwrap_or(state.pending.len());
        state.pending.insert(at, record);
        drop(state);
        self.wake.notify_all();
        Ok(())
    }

    /// Remove a pending job from the queue and finish it as cancelled
    ///
    /// Returns false if the job is not pending (already admitted or done).
    pub fn cancel_pending(&self, job: &JobId) -> bool {
        let record = {
            let mut state = self.lock();
            let Some(at) = state.pending.iter().position(|p| p.id() == job) else {
                return false;
            };
            state.pending.remove(at)
        };

        if let Err(e) = record.finish(JobStatus::Cancelled) {
            tracing::error!(job = %job, error = %e, "cancel of pending job");
        }
        tracing::info!(job = %job, name = record.name(), "cancelled before admission");
        self.events.publish(Event::JobCancelled { id: job.clone() });
        true
    }

    /// Worker side: take the next admissible pending job, blocking until one
    /// exists
    ///
    /// The job is admitted as running on `thread` before it is returned.
    /// Returns `None` once the scheduler is shut down.
    pub(crate) fn next_ready(&self, thread: ThreadId) -> Option<Arc<JobRecord>> {
        let mut state = self.lock();
        loop {
            if state.shut_down {
                return None;
            }
            if let Some(at) = state.first_admissible() {
                let record = state.pending.remove(at);
                state.running.insert(
                    record.id().clone(),
                    RunningJob {
                        rule: record.rule().clone(),
                        thread,
                    },
                );
                return Some(record);
            }
            state = self.wake.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Stop dispatching; returns the jobs that were still pending
    pub(crate) fn shutdown(&self) -> Vec<Arc<JobRecord>> {
        let drained = {
            let mut state = self.lock();
            state.shut_down = true;
            std::mem::take(&mut state.pending)
        };
        self.wake.notify_all();
        drained
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    pub fn is_running(&self, job: &JobId) -> bool {
        self.lock().running.contains_key(job)
    }

    pub fn running_count(&self) -> usize {
        self.lock().running.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Running jobs whose rule conflicts with `rule`
    pub fn holders_of(&self, rule: &Rule) -> Vec<JobId> {
        self.lock()
            .running
            .iter()
            .filter(|(_, r)| r.rule.conflicts_with(rule))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
