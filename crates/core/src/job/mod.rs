// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real jobs: units of work run by the worker pool
//!
//! - `Job` - the work itself, with an optional guarding rule and a priority
//! - `JobState` - `Pending -> Running -> Done`
//! - `JobHandle` - caller's view of a scheduled job (cancel, join)

mod definition;
mod handle;
mod state;

pub use definition::{job_fn, FnJob, Job, JobContext};
pub use handle::JobHandle;
pub(crate) use handle::JobRecord;
pub use state::{JobPriority, JobState, JobStatus};
