// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rj-core: rule-based job scheduling
//!
//! Jobs declare a scheduling rule describing the resource they touch. The
//! scheduler never runs two jobs with conflicting rules at once. Threads that
//! are not running a scheduled job can still take part through implicit
//! jobs: `begin(rule)` blocks until the rule is free, `end()` releases it.
//!
//! - `Rule` and its kinds (`PathRule`, `ExclusiveRule`, `MultiRule`)
//! - `JobManager` - scheduler, worker pool, implicit jobs and lock bookkeeping
//! - `Event` / `EventBus` - diagnostics for admissions, waits and deadlocks

pub mod clock;
pub mod config;
pub mod coordination;
pub mod engine;
pub mod error;
pub mod event;
pub mod events;
pub mod id;
pub mod job;
pub mod rule;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::ManagerConfig;
pub use coordination::{DeadlockReport, LockManager};
pub use engine::{EffectiveRule, ImplicitJobs, JobManager, Scheduler};
pub use error::{JobError, ProtocolViolation};
pub use event::Event;
pub use events::{EventBus, EventPattern, EventReceiver, Subscription};
pub use id::{IdGen, JobId, SequentialIdGen, UuidIdGen};
pub use job::{job_fn, FnJob, Job, JobContext, JobHandle, JobPriority, JobState, JobStatus};
pub use rule::{ExclusiveRule, MultiRule, NoRule, PathRule, Rule, SchedulingRule};
