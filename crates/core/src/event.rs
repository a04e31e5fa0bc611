// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostic events published by the job manager
//!
//! Threads are rendered with their `Debug` form (`ThreadId(7)`) so events stay
//! plain data that subscribers can log or assert on.

use crate::id::JobId;
use crate::job::JobStatus;
use std::thread::ThreadId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    // Real jobs
    JobScheduled {
        id: JobId,
        name: String,
    },
    JobAdmitted {
        id: JobId,
        thread: String,
    },
    JobDone {
        id: JobId,
        status: JobStatus,
    },
    JobCancelled {
        id: JobId,
    },

    // Implicit jobs
    ImplicitBegin {
        thread: String,
        rule: String,
        depth: usize,
    },
    ImplicitEnd {
        thread: String,
        depth: usize,
    },

    // Lock bookkeeping
    LockWaiting {
        thread: String,
        job: JobId,
        blockers: usize,
    },
    LockWaitLong {
        thread: String,
        job: JobId,
        waited_ms: u64,
    },
    DeadlockSuspected {
        thread: String,
        job: JobId,
        cycle: Vec<String>,
    },

    ProtocolViolation {
        thread: String,
        detail: String,
    },
}

impl Event {
    /// Event name for pattern matching, `category:action[:detail]`
    pub fn name(&self) -> &'static str {
        match self {
            Event::JobScheduled { .. } => "job:scheduled",
            Event::JobAdmitted { .. } => "job:admitted",
            Event::JobDone { .. } => "job:done",
            Event::JobCancelled { .. } => "job:cancelled",
            Event::ImplicitBegin { .. } => "implicit:begin",
            Event::ImplicitEnd { .. } => "implicit:end",
            Event::LockWaiting { .. } => "lock:wait",
            Event::LockWaitLong { .. } => "lock:wait:long",
            Event::DeadlockSuspected { .. } => "lock:deadlock",
            Event::ProtocolViolation { .. } => "protocol:violation",
        }
    }
}

/// Render a thread id the way events carry it
pub fn thread_label(thread: ThreadId) -> String {
    format!("{:?}", thread)
}
