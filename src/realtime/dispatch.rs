// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Inbound message fan-out

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::protocol::InboundMessage;

/// Subscriber callback
pub type Handler = Arc<dyn Fn(&InboundMessage) -> anyhow::Result<()> + Send + Sync>;

/// Returned by `subscribe`; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(pub(crate) u64);

/// Registered handlers, called in subscription order
#[derive(Default)]
pub struct Subscribers {
    handlers: BTreeMap<SubscriptionToken, Handler>,
}

impl Subscribers {
    pub fn insert(&mut self, token: SubscriptionToken, handler: Handler) {
        self.handlers.insert(token, handler);
    }

    pub fn remove(&mut self, token: SubscriptionToken) -> bool {
        self.handlers.remove(&token).is_some()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver to every handler. A failing or panicking handler is logged
    /// and does not stop delivery to the rest. Returns the failure count.
    pub fn dispatch(&self, message: &InboundMessage) -> usize {
        let mut failures = 0;
        for (token, handler) in &self.handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::warn!(subscriber = token.0, kind = %message.kind, "handler failed: {e:#}");
                }
                Err(_) => {
                    failures += 1;
                    tracing::error!(subscriber = token.0, kind = %message.kind, "handler panicked");
                }
            }
        }
        failures
    }
}
