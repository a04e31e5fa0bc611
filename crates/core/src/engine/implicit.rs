// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Implicit jobs: rule scopes for arbitrary threads
//!
//! `begin(rule)` / `end()` let any thread, not only a worker running a
//! scheduled job, take part in rule admission. The first `begin` on a thread
//! creates a pseudo-job for it and blocks until the scheduler admits that
//! pseudo-job; nested pairs on the same thread only push and pop the rule
//! stack and never block, so a thread cannot deadlock against itself.
//!
//! A thread that is already running a real job with a rule inherits that
//! rule instead of requesting a new one: asking for a narrower rule would
//! conflict with the enclosing job and never be admitted.

use super::scheduler::Scheduler;
use super::worker::{CurrentJobs, OpenScopes};
use crate::clock::Clock;
use crate::coordination::LockManager;
use crate::error::{JobError, ProtocolViolation};
use crate::event::{thread_label, Event};
use crate::events::EventBus;
use crate::id::{IdGen, JobId};
use crate::job::{JobState, JobStatus};
use crate::rule::Rule;
use dashmap::DashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Rule a pseudo-job is registered under, decided once at creation
#[derive(Clone, Debug)]
pub enum EffectiveRule {
    /// First rule pushed on the thread; admitted through the scheduler
    Owned(Rule),
    /// Rule of the real job already running on the thread; never re-requested
    Inherited(Rule),
}

impl EffectiveRule {
    pub fn rule(&self) -> &Rule {
        match self {
            EffectiveRule::Owned(rule) | EffectiveRule::Inherited(rule) => rule,
        }
    }

    pub fn is_inherited(&self) -> bool {
        matches!(self, EffectiveRule::Inherited(_))
    }
}

/// A thread's occupancy of its effective rule
#[derive(Debug)]
struct ThreadJob {
    id: JobId,
    effective: EffectiveRule,
    /// Innermost last; never empty while the entry is registered
    stack: Vec<Rule>,
    state: JobState,
}

impl ThreadJob {
    fn owned(id: JobId, rule: Rule) -> Self {
        Self {
            id,
            effective: EffectiveRule::Owned(rule),
            stack: Vec::with_capacity(2),
            state: JobState::Pending,
        }
    }

    fn inherited(id: JobId, rule: Rule) -> Self {
        Self {
            id,
            effective: EffectiveRule::Inherited(rule),
            stack: Vec::with_capacity(2),
            state: JobState::Running,
        }
    }
}

/// Per-thread registry of pseudo-jobs
pub struct ImplicitJobs<C: Clock, I: IdGen> {
    threads: DashMap<ThreadId, ThreadJob>,
    scheduler: Arc<Scheduler>,
    locks: Arc<LockManager<C>>,
    current: Arc<CurrentJobs>,
    events: EventBus,
    id_gen: I,
    wait_slice: Duration,
}

impl<C: Clock, I: IdGen> ImplicitJobs<C, I> {
    pub(crate) fn new(
        scheduler: Arc<Scheduler>,
        locks: Arc<LockManager<C>>,
        current: Arc<CurrentJobs>,
        events: EventBus,
        id_gen: I,
        wait_slice: Duration,
    ) -> Self {
        Self {
            threads: DashMap::new(),
            scheduler,
            locks,
            current,
            events,
            id_gen,
            wait_slice,
        }
    }

    /// Rule of the real job running on `thread`, if it has one
    fn enclosing_rule(&self, thread: ThreadId) -> Option<Rule> {
        self.current
            .get(&thread)
            .map(|job| job.rule.clone())
            .filter(|rule| !rule.is_none())
    }

    /// Enter a rule scope on the calling thread
    ///
    /// Blocks only on the outermost call of a nesting chain, and only while a
    /// running job holds a conflicting rule. On return the thread holds its
    /// effective rule until the matching number of [`end`](Self::end) calls.
    pub fn begin(&self, rule: Rule) {
        let thread = thread::current().id();
        let span = tracing::debug_span!("implicit.begin", thread = ?thread, rule = %rule);
        let _guard = span.enter();

        let mut join: Option<(JobId, Rule)> = None;
        let depth = {
            let mut entry = self.threads.entry(thread).or_insert_with(|| {
                let id = self.id_gen.next_job_id();
                match self.enclosing_rule(thread) {
                    Some(enclosing) => {
                        tracing::debug!(job = %id, enclosing = %enclosing, "inheriting rule of running job");
                        ThreadJob::inherited(id, enclosing)
                    }
                    None => {
                        join = Some((id.clone(), rule.clone()));
                        ThreadJob::owned(id, rule.clone())
                    }
                }
            });
            if !entry.effective.rule().contains(&rule) {
                tracing::debug!(
                    effective = %entry.effective.rule(),
                    "nested rule not contained by effective rule"
                );
            }
            entry.stack.push(rule.clone());
            entry.stack.len()
        };

        self.events.publish(Event::ImplicitBegin {
            thread: thread_label(thread),
            rule: rule.to_string(),
            depth,
        });

        if let Some((id, rule)) = join {
            self.join_run(thread, &id, &rule);
        }
    }

    /// Admit the thread's pseudo-job, suspending while conflicting jobs run
    fn join_run(&self, thread: ThreadId, id: &JobId, rule: &Rule) {
        if !rule.is_none() {
            self.locks.add_lock_thread(thread);
        }

        self.scheduler
            .wait_for_admission(id, rule, thread, self.wait_slice, |blockers| {
                self.locks.about_to_wait(thread, id, blockers);
            });
        self.locks.about_to_release(thread);

        if let Some(mut entry) = self.threads.get_mut(&thread) {
            entry.state = JobState::Running;
        }
        tracing::debug!(job = %id, "implicit job admitted");
        self.events.publish(Event::JobAdmitted {
            id: id.clone(),
            thread: thread_label(thread),
        });
    }

    /// Leave the innermost open rule scope of the calling thread
    ///
    /// Fails with [`ProtocolViolation::UnmatchedEnd`] if the thread has no
    /// open scope. Only the calling thread's entry is ever touched.
    pub fn end(&self) -> Result<(), JobError> {
        let thread = thread::current().id();
        let span = tracing::debug_span!("implicit.end", thread = ?thread);
        let _guard = span.enter();

        let depth = {
            let Some(mut entry) = self.threads.get_mut(&thread) else {
                return Err(self.violation(thread, ProtocolViolation::UnmatchedEnd));
            };
            entry.stack.pop();
            entry.stack.len()
        };

        self.events.publish(Event::ImplicitEnd {
            thread: thread_label(thread),
            depth,
        });

        if depth > 0 {
            return Ok(());
        }

        let Some((_, job)) = self.threads.remove(&thread) else {
            return Ok(());
        };

        let EffectiveRule::Owned(rule) = &job.effective else {
            tracing::debug!(job = %job.id, "inherited scope closed");
            return Ok(());
        };

        self.scheduler.release(&job.id);
        if !rule.is_none() {
            self.locks.remove_lock_thread(thread);
        }

        if job.state != JobState::Running {
            self.locks.about_to_release(thread);
            return Err(self.violation(thread, ProtocolViolation::EndBeforeAdmission));
        }

        tracing::debug!(job = %job.id, "implicit job done");
        self.events.publish(Event::JobDone {
            id: job.id.clone(),
            status: JobStatus::Ok,
        });
        Ok(())
    }

    /// Run `f` inside a `begin(rule)` / `end()` pair
    ///
    /// The scope is closed even if `f` panics; the panic then continues
    /// unwinding.
    pub fn with_rule<T>(&self, rule: Rule, f: impl FnOnce() -> T) -> Result<T, JobError> {
        self.begin(rule);
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));
        let ended = self.end();
        match outcome {
            Ok(value) => ended.map(|()| value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn violation(&self, thread: ThreadId, violation: ProtocolViolation) -> JobError {
        tracing::error!(thread = ?thread, "{}", violation);
        self.events.publish(Event::ProtocolViolation {
            thread: thread_label(thread),
            detail: violation.to_string(),
        });
        JobError::ProtocolViolation(violation)
    }

    /// Number of open scopes on the calling thread
    pub fn open_depth(&self) -> usize {
        self.threads
            .get(&thread::current().id())
            .map_or(0, |entry| entry.stack.len())
    }

    /// Number of threads with a live pseudo-job
    pub fn live_count(&self) -> usize {
        self.threads.len()
    }

    pub fn is_active(&self, thread: ThreadId) -> bool {
        self.threads.contains_key(&thread)
    }

    pub fn effective_rule(&self, thread: ThreadId) -> Option<EffectiveRule> {
        self.threads
            .get(&thread)
            .map(|entry| entry.effective.clone())
    }

    /// Id of the pseudo-job registered for `thread`
    pub fn job_id(&self, thread: ThreadId) -> Option<JobId> {
        self.threads.get(&thread).map(|entry| entry.id.clone())
    }
}

impl<C: Clock, I: IdGen> OpenScopes for ImplicitJobs<C, I> {
    /// Close whatever a finished job body left open on `thread`
    fn abandon(&self, thread: ThreadId) {
        let Some((_, job)) = self.threads.remove(&thread) else {
            return;
        };
        tracing::warn!(
            thread = ?thread,
            job = %job.id,
            depth = job.stack.len(),
            "job finished with open rule scopes"
        );
        if let EffectiveRule::Owned(rule) = &job.effective {
            self.scheduler.release(&job.id);
            if !rule.is_none() {
                self.locks.remove_lock_thread(thread);
            }
        }
    }
}

#[cfg(test)]
#[path = "implicit_tests.rs"]
mod tests;
