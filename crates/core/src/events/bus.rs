// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for routing diagnostics to subscribers
//!
//! Publishing never blocks: delivery uses unbounded channels, so the bus can
//! be used from scheduler code that holds locks. Subscribers whose receiver
//! has been dropped are pruned on the next publish.

use super::subscription::{SubscriberId, Subscription};
use crate::event::Event;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Cheaply cloneable; clones share subscribers
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<(Subscription, EventSender)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscription: Subscription) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.retain(|(s, _)| s.id != subscription.id);
        subs.push((subscription, tx));
        rx
    }

    pub fn unsubscribe(&self, id: &SubscriberId) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.retain(|(s, _)| &s.id != id);
    }

    pub fn publish(&self, event: Event) {
        let name = event.name();
        let mut closed = false;
        {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            for (subscription, tx) in subs.iter() {
                if subscription.matches(name) && tx.send(event.clone()).is_err() {
                    closed = true;
                }
            }
        }

        if closed {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            subs.retain(|(_, tx)| !tx.is_closed());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
