// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine: admission, workers and the implicit-job bridge
//!
//! - `Scheduler` - running set and pending queue, one mutex and one condvar
//! - `ImplicitJobs` - `begin`/`end` rule scopes for arbitrary threads
//! - `JobManager` - owns all of the above plus the worker pool

mod implicit;
mod manager;
mod scheduler;
mod worker;

pub use implicit::{EffectiveRule, ImplicitJobs};
pub use manager::JobManager;
pub use scheduler::Scheduler;
