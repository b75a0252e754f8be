//! Transport seam between the connection manager and the network.
//!
//! ```text
//!   ConnectionManager ──open(room, token, sink)──► Connector
//!          ▲                                          │
//!          │  TransportEvent (mpsc, arrival order)    ▼
//!          └──────────────────────────────────── Transport ──► socket
//! ```
//!
//! A connector reports lifecycle changes and inbound frames on the sink the
//! manager hands it. The manager owns the receiving half; dropping it is how
//! listeners are removed before a transport is closed.

pub mod memory;
pub mod ws;

use tokio::sync::mpsc;

use crate::protocol::{ClientIntent, ProtocolError, RoomId, ServerEvent};

pub use memory::{MemoryConnector, MemoryLink, MemoryTransport};
pub use ws::{WsConnector, WsTransport};

/// Sending half handed to a connector.
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Why the initial handshake failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The authority rejected the credentials.
    Unauthorized,
    /// Network-level failure; the transport retries on its own.
    Unreachable(String),
}

/// Why an established connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The authority closed the connection deliberately.
    ServerInitiated,
    /// Connectivity was lost; the transport retries on its own.
    Lost(String),
}

/// Everything a transport can report.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// First successful handshake.
    Open,
    ConnectFailed(ConnectFailure),
    /// The transport is about to retry.
    Reconnecting { attempt: u32 },
    /// A retry succeeded.
    Reopened,
    Closed(CloseReason),
    /// Unrecoverable; the transport has stopped.
    Failed(String),
    Frame(ServerEvent),
}

/// An open (or opening) connection for one room visit.
pub trait Transport: Send {
    /// Hand an intent to the socket. Never blocks.
    fn send(&mut self, intent: &ClientIntent) -> Result<(), TransportError>;

    /// Stop the transport. Safe to call more than once.
    fn close(&mut self);
}

/// Factory for transports.
pub trait Connector {
    type Transport: Transport;

    fn open(&mut self, room: &RoomId, token: &str, events: EventSink) -> Self::Transport;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("outbound queue full")]
    Backpressure,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
