// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule-lock bookkeeping and advisory deadlock detection
//!
//! The lock manager never blocks anyone. It records which threads own
//! rule-based locks and, while a thread is suspended waiting for admission,
//! a wait-for edge from that thread to the threads holding conflicting rules.
//! A cycle through the waiting thread is reported, never broken: conflict
//! predicates are not transitive, so some apparent cycles are benign and
//! aborting a waiter on suspicion would do more harm than good.

use crate::clock::Clock;
use crate::event::{thread_label, Event};
use crate::events::EventBus;
use crate::id::JobId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

/// Deadlock reports kept for inspection; older ones are dropped
pub const RETAINED_REPORTS: usize = 32;

/// A suspected deadlock: `cycle` starts at `thread` and follows wait-for edges
/// back to it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeadlockReport {
    pub thread: ThreadId,
    pub job: JobId,
    pub cycle: Vec<ThreadId>,
}

/// One wait episode of a suspended thread
#[derive(Clone, Debug)]
struct WaitEdge {
    job: JobId,
    blockers: Vec<ThreadId>,
    since: Instant,
    deadlock_reported: bool,
    long_wait_reported: bool,
}

#[derive(Default)]
struct LockState {
    /// Nesting count of rule locks per owning thread
    owners: HashMap<ThreadId, usize>,
    waiting: HashMap<ThreadId, WaitEdge>,
    /// Most recent last, at most `RETAINED_REPORTS`
    reports: VecDeque<DeadlockReport>,
}

impl LockState {
    fn find_cycle(&self, start: ThreadId) -> Option<Vec<ThreadId>> {
        let mut visited = HashSet::new();
        let mut path = vec![start];
        if self.visit(start, start, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn visit(
        &self,
        start: ThreadId,
        node: ThreadId,
        visited: &mut HashSet<ThreadId>,
        path: &mut Vec<ThreadId>,
    ) -> bool {
        let Some(edge) = self.waiting.get(&node) else {
            return false;
        };
        for &next in &edge.blockers {
            if next == start {
                return true;
            }
            if visited.insert(next) {
                path.push(next);
                if self.visit(start, next, visited, path) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }
}

pub struct LockManager<C: Clock> {
    state: Mutex<LockState>,
    clock: C,
    events: EventBus,
    detect_deadlocks: bool,
    long_wait_threshold: Duration,
}

impl<C: Clock> LockManager<C> {
    pub fn new(clock: C, events: EventBus) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            clock,
            events,
            detect_deadlocks: true,
            long_wait_threshold: Duration::from_secs(30),
        }
    }

    pub fn with_deadlock_detection(mut self, enabled: bool) -> Self {
        self.detect_deadlocks = enabled;
        self
    }

    pub fn with_long_wait_threshold(mut self, threshold: Duration) -> Self {
        self.long_wait_threshold = threshold;
        self
    }

    fn lock(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `thread` now owns (another level of) a rule-based lock
    pub fn add_lock_thread(&self, thread: ThreadId) {
        *self.lock().owners.entry(thread).or_insert(0) += 1;
    }

    /// `thread` released one level of rule-based lock ownership
    pub fn remove_lock_thread(&self, thread: ThreadId) {
        let mut state = self.lock();
        let remaining = match state.owners.get_mut(&thread) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => {
                tracing::debug!(thread = ?thread, "release by thread that owns no rule lock");
                return;
            }
        };
        if remaining == 0 {
            state.owners.remove(&thread);
        }
    }

    pub fn is_lock_owner(&self, thread: ThreadId) -> bool {
        self.lock().owners.contains_key(&thread)
    }

    /// Record that `thread` is about to suspend waiting for `job` to be admitted
    ///
    /// `blockers` are the threads currently holding rules that conflict with
    /// the job's rule. Called before every suspension, so an episode's edge is
    /// refreshed as blockers come and go. Returns a report the first time a
    /// cycle is found in an episode.
    pub fn about_to_wait(
        &self,
        thread: ThreadId,
        job: &JobId,
        blockers: &[ThreadId],
    ) -> Option<DeadlockReport> {
        let now = self.clock.now();
        let mut state = self.lock();

        let fresh = !matches!(state.waiting.get(&thread), Some(edge) if &edge.job == job);
        if fresh {
            state.waiting.insert(
                thread,
                WaitEdge {
                    job: job.clone(),
                    blockers: blockers.to_vec(),
                    since: now,
                    deadlock_reported: false,
                    long_wait_reported: false,
                },
            );
            tracing::debug!(thread = ?thread, job = %job, blockers = blockers.len(), "waiting for rule");
            self.events.publish(Event::LockWaiting {
                thread: thread_label(thread),
                job: job.clone(),
                blockers: blockers.len(),
            });
        }

        let threshold = self.long_wait_threshold;
        let edge = state.waiting.get_mut(&thread)?;
        edge.blockers = blockers.to_vec();

        let waited = self.clock.elapsed_since(edge.since);
        if !edge.long_wait_reported && waited >= threshold {
            edge.long_wait_reported = true;
            let waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(thread = ?thread, job = %job, waited_ms, "long wait for rule");
            self.events.publish(Event::LockWaitLong {
                thread: thread_label(thread),
                job: job.clone(),
                waited_ms,
            });
        }

        if !self.detect_deadlocks || edge.deadlock_reported {
            return None;
        }

        let cycle = state.find_cycle(thread)?;
        if let Some(edge) = state.waiting.get_mut(&thread) {
            edge.deadlock_reported = true;
        }
        let report = DeadlockReport {
            thread,
            job: job.clone(),
            cycle,
        };
        if state.reports.len() == RETAINED_REPORTS {
            state.reports.pop_front();
        }
        state.reports.push_back(report.clone());

        tracing::warn!(
            thread = ?thread,
            job = %job,
            cycle = ?report.cycle,
            "possible deadlock: wait-for cycle between rule holders"
        );
        self.events.publish(Event::DeadlockSuspected {
            thread: thread_label(thread),
            job: job.clone(),
            cycle: report.cycle.iter().map(|t| thread_label(*t)).collect(),
        });

        Some(report)
    }

    /// Clear the wait-for edge of a thread that stopped waiting
    pub fn about_to_release(&self, thread: ThreadId) {
        if let Some(edge) = self.lock().waiting.remove(&thread) {
            tracing::trace!(thread = ?thread, job = %edge.job, "wait finished");
        }
    }

    pub fn is_waiting(&self, thread: ThreadId) -> bool {
        self.lock().waiting.contains_key(&thread)
    }

    pub fn waiting_threads(&self) -> Vec<ThreadId> {
        self.lock().waiting.keys().copied().collect()
    }

    /// The most recent deadlock suspicions, oldest first
    pub fn deadlock_reports(&self) -> Vec<DeadlockReport> {
        self.lock().reports.iter().cloned().collect()
    }
}

#[cfg(test)]
#[path = "lock_manager_tests.rs"]
mod tests;
