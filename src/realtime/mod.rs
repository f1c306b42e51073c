// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Realtime channel: a self-healing websocket session
//!
//! [`SessionManager`] keeps one socket alive, queues writes while the
//! socket is down, detects silent death through ping/pong, and reconnects
//! with capped exponential backoff.

pub mod dispatch;
pub mod heartbeat;
pub mod mock_connector;
pub mod protocol;
pub mod queue;
pub mod reconnect;
pub mod session;
pub mod timer;
pub mod transport;

pub use dispatch::SubscriptionToken;
pub use mock_connector::MockConnector;
pub use protocol::InboundMessage;
pub use session::{ConnectionState, SendOutcome, SessionManager, SessionStatus};
pub use transport::{Connector, WsConnector};
