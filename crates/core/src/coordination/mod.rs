// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination bookkeeping for rule-based locks
//!
//! - **LockManager** - per-thread rule-lock ownership, wait-for edges and
//!   advisory deadlock reports

pub mod lock_manager;

pub use lock_manager::{DeadlockReport, LockManager, RETAINED_REPORTS};
