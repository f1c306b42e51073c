// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! In-memory connector for driving the session state machine in tests
//!
//! Each `open` call records a link. Test code plays the server side by
//! emitting events on the most recent link and reads back whatever the
//! session wrote to it.

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::transport::{Connector, OutboundFrame, TransportEvents, TransportLink};
use crate::error::ErrorKind;

struct MockLink {
    url: String,
    events: TransportEvents,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    frames: Vec<OutboundFrame>,
}

impl MockLink {
    fn drain(&mut self) {
        while let Ok(frame) = self.outbound.try_recv() {
            self.frames.push(frame);
        }
    }
}

#[derive(Default)]
struct MockState {
    auto_open: bool,
    links: Vec<MockLink>,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every link reports `Opened` as soon as it is created.
    pub fn auto_open() -> Self {
        let connector = Self::default();
        connector.lock().auto_open = true;
        connector
    }

    pub fn open_count(&self) -> usize {
        self.lock().links.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.lock().links.iter().map(|l| l.url.clone()).collect()
    }

    /// The latest link completes its handshake.
    pub fn accept(&self) {
        self.with_latest(|link| link.events.opened());
    }

    pub fn fail(&self, kind: ErrorKind, detail: &str) {
        self.with_latest(|link| link.events.error(kind, detail));
    }

    /// The server closes the latest link.
    pub fn close(&self, code: Option<u16>, reason: &str) {
        self.with_latest(|link| link.events.closed(code, reason));
    }

    /// The server sends a frame on the latest link.
    pub fn push(&self, frame: Value) {
        self.with_latest(|link| link.events.message(frame.to_string()));
    }

    pub fn push_raw(&self, text: &str) {
        self.with_latest(|link| link.events.message(text));
    }

    /// Frames written to link `index` (0-based, in open order).
    pub fn frames(&self, index: usize) -> Vec<OutboundFrame> {
        let mut state = self.lock();
        match state.links.get_mut(index) {
            Some(link) => {
                link.drain();
                link.frames.clone()
            }
            None => Vec::new(),
        }
    }

    /// Every text frame written on any link, decoded, in write order.
    pub fn sent(&self) -> Vec<Value> {
        let mut state = self.lock();
        let mut out = Vec::new();
        for link in state.links.iter_mut() {
            link.drain();
            out.extend(link.frames.iter().filter_map(|frame| match frame {
                OutboundFrame::Text(text) => serde_json::from_str(text).ok(),
                OutboundFrame::Close { .. } => None,
            }));
        }
        out
    }

    /// Sent frames of one `type`
    pub fn sent_of_type(&self, kind: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|frame| frame.get("type").and_then(Value::as_str) == Some(kind))
            .collect()
    }

    /// Close codes written by the session, per link index
    pub fn close_codes(&self) -> Vec<(usize, u16)> {
        let mut state = self.lock();
        let mut out = Vec::new();
        for (index, link) in state.links.iter_mut().enumerate() {
            link.drain();
            for frame in &link.frames {
                if let OutboundFrame::Close { code, .. } = frame {
                    out.push((index, *code));
                }
            }
        }
        out
    }

    fn with_latest(&self, f: impl FnOnce(&MockLink)) {
        let state = self.lock();
        match state.links.last() {
            Some(link) => f(link),
            None => tracing::warn!("mock connector has no link yet"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("mock connector lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Connector for MockConnector {
    fn open(&self, url: &str, events: TransportEvents) -> TransportLink {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = TransportLink::new(events.link_id(), tx);
        let mut state = self.lock();
        if state.auto_open {
            events.opened();
        }
        state.links.push(MockLink {
            url: url.to_string(),
            events,
            outbound: rx,
            frames: Vec::new(),
        });
        link
    }
}
