// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle states, results and priorities

use std::fmt;

/// Dispatch priority; lower variants run first among admissible pending jobs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobPriority {
    Interactive,
    Short,
    #[default]
    Long,
    Build,
    Decorate,
}

/// Lifecycle of a job
///
/// ```text
/// Pending --admit--> Running --finish--> Done
///    |                                    ^
///    +------------- cancel ---------------+
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Registered, waiting for admission
    Pending,
    /// Admitted: holds its rule
    Running,
    Done,
}

impl JobState {
    /// Monotonic: no transition ever moves backwards
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Done)
                | (JobState::Pending, JobState::Done)
        )
    }

    pub fn is_done(self) -> bool {
        self == JobState::Done
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Done => "done",
        };
        f.write_str(s)
    }
}

/// Outcome of a finished job
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Ok,
    Cancelled,
    Error(String),
}

impl JobStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, JobStatus::Ok)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Ok => f.write_str("ok"),
            JobStatus::Cancelled => f.write_str("cancelled"),
            JobStatus::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
