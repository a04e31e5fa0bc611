// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for job scheduling and rule scopes

use crate::id::JobId;
use crate::job::JobState;
use thiserror::Error;

/// Misuse of the `begin`/`end` protocol by the calling thread
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("end() without a matching begin() on this thread")]
    UnmatchedEnd,
    #[error("end() before the implicit job was admitted")]
    EndBeforeAdmission,
}

/// Errors surfaced by the job manager
#[derive(Debug, Error)]
pub enum JobError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),
    #[error("invalid state transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobState,
        to: JobState,
    },
    #[error("job manager is shut down")]
    ShutDown,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// The protocol violation behind this error, if any
    pub fn violation(&self) -> Option<ProtocolViolation> {
        match self {
            JobError::ProtocolViolation(v) => Some(*v),
            _ => None,
        }
    }
}
