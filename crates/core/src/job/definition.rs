// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Job` trait and a closure-backed implementation

use super::state::{JobPriority, JobStatus};
use crate::id::JobId;
use crate::rule::Rule;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Passed to [`Job::run`]
#[derive(Clone, Debug)]
pub struct JobContext {
    id: JobId,
    cancelled: Arc<AtomicBool>,
}

impl JobContext {
    pub(crate) fn new(id: JobId, cancelled: Arc<AtomicBool>) -> Self {
        Self { id, cancelled }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Cancellation is cooperative: long-running jobs should poll this
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A schedulable unit of work
///
/// The rule is read once when the job is scheduled. While `run` executes on a
/// worker thread, no other job or implicit scope holding a conflicting rule
/// is running.
pub trait Job: Send + 'static {
    fn name(&self) -> &str;

    fn rule(&self) -> Rule {
        Rule::none()
    }

    fn priority(&self) -> JobPriority {
        JobPriority::default()
    }

    fn run(&mut self, ctx: &JobContext) -> JobStatus;
}

/// Job backed by a closure
pub struct FnJob<F> {
    name: String,
    rule: Rule,
    priority: JobPriority,
    work: F,
}

impl<F> FnJob<F>
where
    F: FnMut(&JobContext) -> JobStatus + Send + 'static,
{
    pub fn new(name: impl Into<String>, work: F) -> Self {
        Self {
            name: name.into(),
            rule: Rule::none(),
            priority: JobPriority::default(),
            work,
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }
}

impl<F> Job for FnJob<F>
where
    F: FnMut(&JobContext) -> JobStatus + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn rule(&self) -> Rule {
        self.rule.clone()
    }

    fn priority(&self) -> JobPriority {
        self.priority
    }

    fn run(&mut self, ctx: &JobContext) -> JobStatus {
        (self.work)(ctx)
    }
}

/// Shorthand for [`FnJob::new`]
pub fn job_fn<F>(name: impl Into<String>, work: F) -> FnJob<F>
where
    F: FnMut(&JobContext) -> JobStatus + Send + 'static,
{
    FnJob::new(name, work)
}
