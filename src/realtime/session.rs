// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Realtime session manager
//!
//! A single actor task owns the connection state, the outbound queue, the
//! subscriber set and the heartbeat/reconnect timers. Public methods post
//! commands to it; transport events and timer wakeups arrive on their own
//! channels. The actor handles one event at a time, so state transitions
//! never interleave.
//!
//! ```text
//! Idle --connect--> Connecting --opened--> Open --close/error--> Reconnecting
//!                        ^                                            |
//!                        +------------------ backoff elapses ---------+
//! any --disconnect--> Closed
//! ```

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::dispatch::{Handler, Subscribers, SubscriptionToken};
use super::heartbeat::{HeartbeatAction, HeartbeatMonitor};
use super::protocol::{self, InboundMessage};
use super::queue::MessageQueue;
use super::reconnect::ReconnectPolicy;
use super::timer::ScheduledTask;
use super::transport::{
    Connector, LinkId, TransportEvent, TransportEvents, TransportLink, WsConnector, CLOSE_NORMAL,
};
use crate::config::RealtimeConfig;
use crate::error::ErrorKind;

/// Close code used when the heartbeat declares a link dead
const CLOSE_HEARTBEAT_TIMEOUT: u16 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Snapshot published after every transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: ConnectionState,
    /// Current reconnect attempt; 0 while healthy
    pub attempt: u32,
    /// Persistent connectivity problem, e.g. `ReconnectExhausted`
    pub degraded: Option<ErrorKind>,
    /// Messages evicted because the queue was full
    pub dropped_overflow: u64,
    /// Messages discarded at flush for exceeding the retention window
    pub dropped_expired: u64,
    /// Messages waiting for a live connection
    pub queued: usize,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            attempt: 0,
            degraded: None,
            dropped_overflow: 0,
            dropped_expired: 0,
            queued: 0,
        }
    }
}

/// Informational result of `send`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Queued,
}

enum Command {
    Connect,
    Send(Value),
    Subscribe(SubscriptionToken, Handler),
    Unsubscribe(SubscriptionToken),
    Disconnect,
    Shutdown,
}

#[derive(Debug)]
enum TimerEvent {
    Reconnect(u64),
    Heartbeat(u64),
}

/// Handle to the realtime session actor
pub struct SessionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    next_token: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Spawn the session actor. Must be called inside a tokio runtime.
    pub fn new(
        config: RealtimeConfig,
        auth_token: Option<String>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SessionStatus::default());
        let (actor, transport_rx, timer_rx) =
            SessionActor::new(config, auth_token, connector, status_tx);
        let task = tokio::spawn(actor.run(command_rx, transport_rx, timer_rx));

        Self {
            commands,
            status,
            next_token: AtomicU64::new(1),
            task: Mutex::new(Some(task)),
        }
    }

    /// Session over a real websocket
    pub fn with_websocket(config: RealtimeConfig, auth_token: Option<String>) -> Self {
        let connector = WsConnector::new(Duration::from_millis(config.connect_timeout_ms));
        Self::new(config, auth_token, Arc::new(connector))
    }

    /// No-op while open or connecting; supersedes a pending reconnect.
    pub fn connect(&self) {
        self.post(Command::Connect);
    }

    /// Transmit now if open, otherwise queue. Never fails.
    pub fn send(&self, payload: Value) -> SendOutcome {
        let outcome = if self.state() == ConnectionState::Open {
            SendOutcome::Sent
        } else {
            SendOutcome::Queued
        };
        self.post(Command::Send(payload));
        outcome
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: Fn(&InboundMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.post(Command::Subscribe(token, Arc::new(handler)));
        token
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.post(Command::Unsubscribe(token));
    }

    /// Cancel timers, close with 1000, drop subscribers and queued messages.
    pub fn disconnect(&self) {
        self.post(Command::Disconnect);
    }

    /// Disconnect and stop the actor task.
    pub async fn shutdown(&self) {
        self.post(Command::Shutdown);
        let task = match self.task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("session task ended abnormally: {e}");
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn snapshot(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    fn post(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("session task has stopped; command ignored");
        }
    }
}

struct SessionActor {
    config: RealtimeConfig,
    token: Option<String>,
    connector: Arc<dyn Connector>,
    reconnect: ReconnectPolicy,

    state: ConnectionState,
    link: Option<TransportLink>,
    next_link_id: LinkId,
    queue: MessageQueue,
    subscribers: Subscribers,
    heartbeat: Option<HeartbeatMonitor>,

    heartbeat_timer: Option<ScheduledTask>,
    heartbeat_generation: u64,
    reconnect_timer: Option<ScheduledTask>,
    reconnect_generation: u64,
    timer_seq: u64,

    attempt: u32,
    degraded: Option<ErrorKind>,
    dropped_overflow: u64,
    dropped_expired: u64,
    last_chat_id: Option<String>,

    status_tx: watch::Sender<SessionStatus>,
    transport_tx: mpsc::UnboundedSender<(LinkId, TransportEvent)>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
}

type ActorParts = (
    SessionActor,
    mpsc::UnboundedReceiver<(LinkId, TransportEvent)>,
    mpsc::UnboundedReceiver<TimerEvent>,
);

impl SessionActor {
    fn new(
        config: RealtimeConfig,
        token: Option<String>,
        connector: Arc<dyn Connector>,
        status_tx: watch::Sender<SessionStatus>,
    ) -> ActorParts {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let actor = Self {
            reconnect: ReconnectPolicy::from(&config.reconnect),
            queue: MessageQueue::from(&config.queue),
            config,
            token,
            connector,
            state: ConnectionState::Idle,
            link: None,
            next_link_id: 0,
            subscribers: Subscribers::default(),
            heartbeat: None,
            heartbeat_timer: None,
            heartbeat_generation: 0,
            reconnect_timer: None,
            reconnect_generation: 0,
            timer_seq: 0,
            attempt: 0,
            degraded: None,
            dropped_overflow: 0,
            dropped_expired: 0,
            last_chat_id: None,
            status_tx,
            transport_tx,
            timer_tx,
        };
        (actor, transport_rx, timer_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut transport_rx: mpsc::UnboundedReceiver<(LinkId, TransportEvent)>,
        mut timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => {
                        self.teardown();
                        self.publish();
                        break;
                    }
                    Some(command) => self.handle_command(command),
                },
                Some((link, event)) = transport_rx.recv() => self.handle_transport(link, event),
                Some(timer) = timer_rx.recv() => self.handle_timer(timer),
            }
            self.publish();
        }
        tracing::debug!("session actor stopped");
    }

    fn publish(&self) {
        let next = SessionStatus {
            state: self.state,
            attempt: self.attempt,
            degraded: self.degraded,
            dropped_overflow: self.dropped_overflow,
            dropped_expired: self.dropped_expired,
            queued: self.queue.len(),
        };
        self.status_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Send(payload) => self.send(payload),
            Command::Subscribe(token, handler) => self.subscribers.insert(token, handler),
            Command::Unsubscribe(token) => {
                self.subscribers.remove(token);
            }
            Command::Disconnect | Command::Shutdown => self.teardown(),
        }
    }

    fn connect(&mut self) {
        match self.state {
            ConnectionState::Open | ConnectionState::Connecting => {
                tracing::debug!(state = %self.state, "connect ignored");
            }
            ConnectionState::Reconnecting => {
                tracing::info!(attempt = self.attempt, "connect supersedes scheduled reconnect");
                self.open_link();
            }
            ConnectionState::Idle | ConnectionState::Closed => {
                self.attempt = 0;
                self.degraded = None;
                self.open_link();
            }
        }
    }

    fn open_link(&mut self) {
        self.cancel_reconnect();
        self.next_link_id += 1;
        let link = self.next_link_id;
        let events = TransportEvents::new(link, self.transport_tx.clone());
        let url = self.connect_url();

        tracing::info!(link, attempt = self.attempt, "connecting");
        self.link = Some(self.connector.open(&url, events));
        self.state = ConnectionState::Connecting;
    }

    fn connect_url(&self) -> String {
        let Some(token) = self.token.as_deref() else {
            return self.config.ws_url.clone();
        };
        match reqwest::Url::parse(&self.config.ws_url) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("token", token);
                url.to_string()
            }
            Err(e) => {
                tracing::warn!("cannot add token to websocket url: {e}");
                self.config.ws_url.clone()
            }
        }
    }

    fn send(&mut self, payload: Value) {
        if self.state == ConnectionState::Open && self.transmit(&payload) {
            return;
        }
        self.enqueue(payload);

        let revive = match self.state {
            ConnectionState::Idle => true,
            ConnectionState::Closed => self.degraded.is_some(),
            _ => false,
        };
        if revive {
            self.connect();
        }
    }

    /// Write a frame to the current link. `false` if there is no usable link.
    fn transmit(&mut self, payload: &Value) -> bool {
        let Some(link) = self.link.as_ref() else {
            return false;
        };
        let token = if self.config.production {
            self.token.as_deref()
        } else {
            None
        };
        let frame = match protocol::encode(payload, Utc::now(), token) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("dropping frame that failed to encode: {e}");
                return true;
            }
        };
        if !link.send_text(frame.text) {
            return false;
        }
        if let Some(id) = frame.chat_id {
            tracing::debug!(id = %id, "chat frame sent");
            self.last_chat_id = Some(id);
        }
        true
    }

    fn enqueue(&mut self, payload: Value) {
        if self.queue.enqueue(payload, Instant::now()).is_some() {
            self.dropped_overflow += 1;
            tracing::warn!(
                kind = %ErrorKind::QueueOverflow,
                capacity = self.queue.capacity(),
                dropped = self.dropped_overflow,
                "queue full; dropped oldest message"
            );
        }
        tracing::debug!(state = %self.state, queued = self.queue.len(), "message queued");
    }

    fn flush(&mut self) {
        let now = Instant::now();
        let mut sent = 0usize;
        let mut expired = 0usize;

        while self.state == ConnectionState::Open {
            let Some(message) = self.queue.pop() else {
                break;
            };
            if self.queue.is_stale(&message, now) {
                expired += 1;
                continue;
            }
            if !self.transmit(&message.payload) {
                self.queue.requeue_front(message);
                break;
            }
            sent += 1;
        }

        if expired > 0 {
            self.dropped_expired += expired as u64;
            tracing::warn!(expired, "discarded queued messages past retention");
        }
        if sent > 0 {
            tracing::info!(sent, remaining = self.queue.len(), "flushed queued messages");
        }
    }

    fn handle_transport(&mut self, link: LinkId, event: TransportEvent) {
        if self.link.as_ref().map(TransportLink::id) != Some(link) {
            tracing::debug!(link, "ignoring event from superseded link");
            return;
        }
        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Error { kind, detail } => {
                tracing::warn!(link, kind = %kind, "transport error: {detail}");
                if kind == ErrorKind::AuthInvalid {
                    self.fail(kind);
                } else {
                    self.handle_loss();
                }
            }
            TransportEvent::Closed { code, reason } => {
                tracing::info!(link, code = ?code, reason = %reason, "link closed");
                self.handle_loss();
            }
        }
    }

    fn on_open(&mut self) {
        self.state = ConnectionState::Open;
        self.attempt = 0;
        self.degraded = None;
        tracing::info!(link = self.next_link_id, "session open");

        if self.config.production {
            if let Some(token) = self.token.clone() {
                self.transmit(&protocol::auth(&token));
            }
        }

        self.heartbeat = Some(HeartbeatMonitor::from_config(&self.config, Instant::now()));
        self.arm_heartbeat();
        self.flush();
    }

    fn on_message(&mut self, text: &str) {
        let mut message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("discarding malformed frame: {e}");
                return;
            }
        };

        if message.is_pong() {
            if let Some(monitor) = self.heartbeat.as_mut() {
                monitor.record_pong(Instant::now());
            }
            return;
        }

        if message.is_chat_response() {
            if message.reply_to.is_none() {
                message.reply_to = self.last_chat_id.take();
            } else if message.reply_to == self.last_chat_id {
                self.last_chat_id = None;
            }
        }

        tracing::debug!(kind = %message.kind, subscribers = self.subscribers.len(), "dispatching");
        self.subscribers.dispatch(&message);
    }

    fn handle_loss(&mut self) {
        self.link = None;
        self.stop_heartbeat();
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        let Some((attempt, delay)) = self.reconnect.next(self.attempt) else {
            tracing::error!(
                attempts = self.attempt,
                "reconnect attempts exhausted; giving up"
            );
            self.fail(ErrorKind::ReconnectExhausted);
            return;
        };

        self.attempt = attempt;
        self.state = ConnectionState::Reconnecting;
        let generation = self.next_generation();
        self.reconnect_generation = generation;
        let tx = self.timer_tx.clone();
        self.reconnect_timer = Some(ScheduledTask::after(delay, move || {
            let _ = tx.send(TimerEvent::Reconnect(generation));
        }));

        tracing::info!(
            attempt,
            max_attempts = self.reconnect.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
    }

    fn handle_timer(&mut self, timer: TimerEvent) {
        match timer {
            TimerEvent::Reconnect(generation) => {
                if generation != self.reconnect_generation
                    || self.state != ConnectionState::Reconnecting
                {
                    return;
                }
                self.reconnect_timer = None;
                self.open_link();
            }
            TimerEvent::Heartbeat(generation) => {
                if generation != self.heartbeat_generation || self.state != ConnectionState::Open
                {
                    return;
                }
                self.heartbeat_timer = None;
                self.on_heartbeat();
            }
        }
    }

    fn on_heartbeat(&mut self) {
        let action = match self.heartbeat.as_mut() {
            Some(monitor) => monitor.poll(Instant::now()),
            None => return,
        };
        match action {
            HeartbeatAction::Dead { silent_for } => {
                tracing::warn!(
                    silent_ms = silent_for.as_millis() as u64,
                    "no pong within liveness window; forcing reconnect"
                );
                if let Some(link) = self.link.take() {
                    link.close(CLOSE_HEARTBEAT_TIMEOUT, "heartbeat timeout");
                }
                self.stop_heartbeat();
                self.state = ConnectionState::Reconnecting;
                self.open_link();
            }
            HeartbeatAction::Ping => {
                tracing::trace!("ping");
                self.transmit(&protocol::ping());
                self.arm_heartbeat();
            }
            HeartbeatAction::Wait => self.arm_heartbeat(),
        }
    }

    fn arm_heartbeat(&mut self) {
        let Some(deadline) = self.heartbeat.as_ref().map(HeartbeatMonitor::next_wakeup) else {
            return;
        };
        let generation = self.next_generation();
        self.heartbeat_generation = generation;
        let tx = self.timer_tx.clone();
        self.heartbeat_timer = Some(ScheduledTask::at(deadline, move || {
            let _ = tx.send(TimerEvent::Heartbeat(generation));
        }));
    }

    fn stop_heartbeat(&mut self) {
        self.heartbeat = None;
        self.heartbeat_timer = None;
        self.heartbeat_generation = 0;
    }

    fn cancel_reconnect(&mut self) {
        self.reconnect_timer = None;
        self.reconnect_generation = 0;
    }

    fn next_generation(&mut self) -> u64 {
        self.timer_seq += 1;
        self.timer_seq
    }

    /// Terminal failure; keeps queued messages and subscribers so a later
    /// `connect()` can resume.
    fn fail(&mut self, kind: ErrorKind) {
        self.cancel_reconnect();
        self.stop_heartbeat();
        self.link = None;
        self.state = ConnectionState::Closed;
        self.degraded = Some(kind);
        tracing::error!(kind = %kind, "{}", kind.user_message());
    }

    fn teardown(&mut self) {
        self.cancel_reconnect();
        self.stop_heartbeat();
        if let Some(link) = self.link.take() {
            link.close(CLOSE_NORMAL, "client disconnect");
        }
        self.subscribers.clear();
        let discarded = self.queue.len();
        self.queue.clear();
        self.state = ConnectionState::Closed;
        self.attempt = 0;
        self.degraded = None;
        self.last_chat_id = None;
        tracing::info!(discarded, "session closed");
    }
}
