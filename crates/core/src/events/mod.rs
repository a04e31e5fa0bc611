// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event routing for diagnostics
//!
//! - `EventBus` - fan events out to matching subscribers
//! - `EventPattern` - `job:*` / `lock:**` style name matching

mod bus;
mod subscription;

pub use bus::{EventBus, EventReceiver, EventSender};
pub use subscription::{EventPattern, SubscriberId, Subscription};
