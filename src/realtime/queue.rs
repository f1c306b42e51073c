// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Bounded FIFO of outbound messages awaiting a live connection

use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::QueueConfig;

/// A payload waiting to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub payload: Value,
    pub enqueued_at: Instant,
}

/// FIFO with a fixed capacity. Overflow drops the oldest entry, never the
/// newest one.
#[derive(Debug)]
pub struct MessageQueue {
    items: VecDeque<QueuedMessage>,
    capacity: usize,
    max_age: Duration,
}

impl From<&QueueConfig> for MessageQueue {
    fn from(config: &QueueConfig) -> Self {
        Self::new(config.capacity, Duration::from_millis(config.max_age_ms))
    }
}

impl MessageQueue {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            max_age,
        }
    }

    /// Admit a payload; returns the entry evicted to make room, if any.
    pub fn enqueue(&mut self, payload: Value, now: Instant) -> Option<QueuedMessage> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(QueuedMessage {
            payload,
            enqueued_at: now,
        });
        evicted
    }

    pub fn pop(&mut self) -> Option<QueuedMessage> {
        self.items.pop_front()
    }

    /// Put back a message taken by `pop` that could not be delivered.
    pub fn requeue_front(&mut self, message: QueuedMessage) {
        if self.items.len() >= self.capacity {
            // the re-queued message is older than anything behind it
            return;
        }
        self.items.push_front(message);
    }

    /// Older than the retention window
    pub fn is_stale(&self, message: &QueuedMessage, now: Instant) -> bool {
        now.saturating_duration_since(message.enqueued_at) > self.max_age
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn queue(capacity: usize) -> MessageQueue {
        MessageQueue::new(capacity, Duration::from_secs(300))
    }

    #[test]
    fn test_fifo_order() {
        let mut q = queue(10);
        let now = Instant::now();
        for i in 0..3 {
            assert!(q.enqueue(json!(i), now).is_none());
        }
        let drained: Vec<Value> = std::iter::from_fn(|| q.pop()).map(|m| m.payload).collect();
        assert_eq!(drained, vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_fifty_one_into_fifty_keeps_newest() {
        let mut q = queue(50);
        let now = Instant::now();
        let mut evicted = Vec::new();
        for i in 0..51 {
            if let Some(old) = q.enqueue(json!(i), now) {
                evicted.push(old.payload);
            }
        }

        assert_eq!(q.len(), 50);
        assert_eq!(evicted, vec![json!(0)]);
        let kept: Vec<Value> = q.iter().map(|m| m.payload.clone()).collect();
        let expected: Vec<Value> = (1..51).map(|i| json!(i)).collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_staleness_window() {
        let q = queue(5);
        let start = Instant::now();
        let message = QueuedMessage {
            payload: json!("x"),
            enqueued_at: start,
        };
        assert!(!q.is_stale(&message, start + Duration::from_secs(300)));
        assert!(q.is_stale(&message, start + Duration::from_millis(300_001)));
    }

    #[test]
    fn test_requeue_front() {
        let mut q = queue(3);
        let now = Instant::now();
        q.enqueue(json!("a"), now);
        q.enqueue(json!("b"), now);
        let first = q.pop().unwrap();
        q.requeue_front(first);
        assert_eq!(q.pop().unwrap().payload, json!("a"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut q = queue(0);
        q.enqueue(json!(1), Instant::now());
        q.enqueue(json!(2), Instant::now());
        assert_eq!(q.capacity(), 1);
        assert_eq!(q.pop().unwrap().payload, json!(2));
    }

    proptest! {
        #[test]
        fn prop_bounded_and_keeps_most_recent(capacity in 1usize..64, count in 0usize..200) {
            let mut q = queue(capacity);
            let now = Instant::now();
            for i in 0..count {
                q.enqueue(json!(i), now);
            }

            prop_assert!(q.len() <= capacity);
            prop_assert_eq!(q.len(), count.min(capacity));
            let kept: Vec<Value> = q.iter().map(|m| m.payload.clone()).collect();
            let expected: Vec<Value> = (count.saturating_sub(capacity)..count).map(|i| json!(i)).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
