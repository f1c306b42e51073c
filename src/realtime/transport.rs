// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Socket transport seam
//!
//! A [`Connector`] opens a link in the background and reports lifecycle
//! events back to the session, each tagged with the link id so that
//! events from a superseded link can be ignored. Outbound frames travel
//! over the [`TransportLink`] handle; dropping it closes the socket.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::ErrorKind;

pub type LinkId = u64;

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;

/// Lifecycle event reported by a link
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error { kind: ErrorKind, detail: String },
    Closed { code: Option<u16>, reason: String },
}

/// Event sink handed to a connector for one link
#[derive(Debug, Clone)]
pub struct TransportEvents {
    link: LinkId,
    tx: mpsc::UnboundedSender<(LinkId, TransportEvent)>,
}

impl TransportEvents {
    pub fn new(link: LinkId, tx: mpsc::UnboundedSender<(LinkId, TransportEvent)>) -> Self {
        Self { link, tx }
    }

    pub fn link_id(&self) -> LinkId {
        self.link
    }

    pub fn emit(&self, event: TransportEvent) {
        if self.tx.send((self.link, event)).is_err() {
            tracing::trace!(link = self.link, "session gone; transport event dropped");
        }
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    pub fn error(&self, kind: ErrorKind, detail: impl Into<String>) {
        self.emit(TransportEvent::Error {
            kind,
            detail: detail.into(),
        });
    }

    pub fn closed(&self, code: Option<u16>, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }
}

/// Frame queued for the socket writer
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// Session-side handle to an open (or opening) link
#[derive(Debug)]
pub struct TransportLink {
    id: LinkId,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

impl TransportLink {
    pub fn new(id: LinkId, outbound: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self { id, outbound }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Hand a text frame to the writer. `false` if the link is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.outbound.send(OutboundFrame::Text(text)).is_ok()
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.outbound.send(OutboundFrame::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

/// Opens links for the session manager
pub trait Connector: Send + Sync + 'static {
    /// Start connecting to `url`. Must not block; progress is reported
    /// through `events`.
    fn open(&self, url: &str, events: TransportEvents) -> TransportLink;
}

/// tokio-tungstenite connector
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Connector for WsConnector {
    fn open(&self, url: &str, events: TransportEvents) -> TransportLink {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = TransportLink::new(events.link_id(), tx);
        tokio::spawn(run_socket(
            url.to_string(),
            self.connect_timeout,
            events,
            rx,
        ));
        link
    }
}

async fn run_socket(
    url: String,
    connect_timeout: Duration,
    events: TransportEvents,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    let link = events.link_id();
    tracing::debug!(link, "opening websocket");

    let stream = match tokio::time::timeout(
        connect_timeout,
        tokio_tungstenite::connect_async(url.as_str()),
    )
    .await
    {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(WsError::Http(response))) => {
            let status = response.status().as_u16();
            let kind = match status {
                401 | 403 => ErrorKind::AuthInvalid,
                429 => ErrorKind::RateLimited,
                _ => ErrorKind::TransportFailure,
            };
            events.error(kind, format!("websocket upgrade rejected with HTTP {status}"));
            return;
        }
        Ok(Err(e)) => {
            events.error(ErrorKind::TransportFailure, format!("connection failed: {e}"));
            return;
        }
        Err(_) => {
            events.error(
                ErrorKind::Timeout,
                format!("connection timed out after {} ms", connect_timeout.as_millis()),
            );
            return;
        }
    };

    events.opened();
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(OutboundFrame::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        events.error(ErrorKind::TransportFailure, format!("send failed: {e}"));
                        return;
                    }
                }
                Some(OutboundFrame::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    return;
                }
                None => {
                    // handle dropped by the session
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => events.message(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_string()),
                        None => (None, String::new()),
                    };
                    events.closed(code, reason);
                    return;
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::debug!(link, "ignoring binary frame");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    events.error(ErrorKind::TransportFailure, e.to_string());
                    return;
                }
                None => {
                    events.closed(None, "stream ended");
                    return;
                }
            },
        }
    }
}
