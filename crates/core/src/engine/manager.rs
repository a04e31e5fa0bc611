// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job manager: the context object tying scheduler, lock manager, implicit
//! jobs and workers together
//!
//! Every piece of scheduling state lives inside a `JobManager` value, so
//! independent managers can coexist in one process.

use super::implicit::{EffectiveRule, ImplicitJobs};
use super::scheduler::Scheduler;
use super::worker::{CurrentJobs, OpenScopes, Worker};
use crate::clock::{Clock, SystemClock};
use crate::config::ManagerConfig;
use crate::coordination::LockManager;
use crate::error::JobError;
use crate::event::Event;
use crate::events::{EventBus, EventReceiver, Subscription};
use crate::id::{IdGen, JobId, UuidIdGen};
use crate::job::{Job, JobHandle, JobRecord, JobStatus};
use crate::rule::Rule;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

pub struct JobManager<C: Clock = SystemClock, I: IdGen = UuidIdGen> {
    config: ManagerConfig,
    scheduler: Arc<Scheduler>,
    locks: Arc<LockManager<C>>,
    clock: C,
    implicit: Arc<ImplicitJobs<C, I>>,
    current: Arc<CurrentJobs>,
    events: EventBus,
    id_gen: I,
    workers: Mutex<Vec<JoinHandle<()>>>,
    subscriber_seq: AtomicU64,
}

impl JobManager {
    /// Manager with the system clock and UUID job ids
    pub fn new(config: ManagerConfig) -> Result<Self, JobError> {
        Self::with_deps(config, SystemClock, UuidIdGen)
    }
}

impl<C: Clock, I: IdGen> JobManager<C, I> {
    pub fn with_deps(config: ManagerConfig, clock: C, id_gen: I) -> Result<Self, JobError> {
        config.validate()?;

        let events = EventBus::new();
        let scheduler = Arc::new(Scheduler::new(events.clone()));
        let locks = Arc::new(
            LockManager::new(clock.clone(), events.clone())
                .with_deadlock_detection(config.deadlock_detection)
                .with_long_wait_threshold(config.long_wait_threshold),
        );
        let current: Arc<CurrentJobs> = Arc::new(CurrentJobs::new());
        let implicit = Arc::new(ImplicitJobs::new(
            Arc::clone(&scheduler),
            Arc::clone(&locks),
            Arc::clone(&current),
            events.clone(),
            id_gen.clone(),
            config.wait_slice,
        ));

        let manager = Self {
            scheduler,
            locks,
            clock,
            implicit,
            current,
            events,
            id_gen,
            workers: Mutex::new(Vec::with_capacity(config.workers)),
            subscriber_seq: AtomicU64::new(1),
            config,
        };
        manager.start_workers()?;

        tracing::info!(
            name = %manager.config.name,
            workers = manager.config.workers,
            "job manager started"
        );
        Ok(manager)
    }

    fn start_workers(&self) -> Result<(), JobError> {
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        for i in 0..self.config.workers {
            let scopes: Arc<dyn OpenScopes> = self.implicit.clone();
            let worker = Worker::new(
                Arc::clone(&self.scheduler),
                Arc::clone(&self.current),
                scopes,
                self.events.clone(),
                self.clock.clone(),
            );
            match worker.spawn(format!("{}-worker-{}", self.config.name, i)) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    drop(workers);
                    self.shutdown();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Queue a job; a worker runs it once its rule is admitted
    pub fn schedule(&self, job: impl Job) -> Result<JobHandle, JobError> {
        let record = Arc::new(JobRecord::new(self.id_gen.next_job_id(), Box::new(job)));
        let id = record.id().clone();
        let name = record.name().to_string();

        self.scheduler.enqueue(Arc::clone(&record))?;
        tracing::debug!(job = %id, name = %name, rule = %record.rule(), "scheduled");
        self.events.publish(Event::JobScheduled { id, name });

        Ok(JobHandle::new(record, Arc::clone(&self.scheduler)))
    }

    /// Enter a rule scope on the calling thread; see [`ImplicitJobs::begin`]
    pub fn begin(&self, rule: Rule) {
        self.implicit.begin(rule);
    }

    /// Leave the innermost rule scope on the calling thread; see [`ImplicitJobs::end`]
    pub fn end(&self) -> Result<(), JobError> {
        self.implicit.end()
    }

    /// Run `f` inside a rule scope; see [`ImplicitJobs::with_rule`]
    pub fn with_rule<T>(&self, rule: Rule, f: impl FnOnce() -> T) -> Result<T, JobError> {
        self.implicit.with_rule(rule, f)
    }

    /// The real job running on the calling thread
    pub fn current_job(&self) -> Option<JobId> {
        self.current
            .get(&thread::current().id())
            .map(|job| job.id.clone())
    }

    /// Effective rule of the calling thread's open scope
    pub fn current_rule(&self) -> Option<EffectiveRule> {
        self.implicit.effective_rule(thread::current().id())
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn lock_manager(&self) -> &LockManager<C> {
        &self.locks
    }

    pub fn implicit_jobs(&self) -> &ImplicitJobs<C, I> {
        &self.implicit
    }

    /// Subscribe to events whose names match any of `patterns`
    pub fn subscribe(&self, patterns: &[&str]) -> EventReceiver {
        let n = self.subscriber_seq.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}-sub-{}", self.config.name, n);
        self.events.subscribe(Subscription::new(id, patterns))
    }

    /// Stop the workers and cancel every job that was never admitted
    ///
    /// Running jobs finish normally. Rule scopes opened with `begin` keep
    /// working after shutdown. Idempotent.
    pub fn shutdown(&self) {
        for record in self.scheduler.shutdown() {
            if let Err(e) = record.finish(JobStatus::Cancelled) {
                tracing::error!(job = %record.id(), error = %e, "cancelling pending job");
            }
            self.events.publish(Event::JobCancelled {
                id: record.id().clone(),
            });
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            workers.drain(..).collect()
        };
        if handles.is_empty() {
            return;
        }

        let me = thread::current().id();
        for handle in handles {
            if handle.thread().id() == me {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
        tracing::info!(name = %self.config.name, "job manager stopped");
    }
}

impl<C: Clock, I: IdGen> Drop for JobManager<C, I> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
