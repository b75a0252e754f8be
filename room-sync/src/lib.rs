//! # room-sync: real-time room synchronization client
//!
//! Keeps one collaborative-editing session in step with a remote room
//! authority: a shared whole-text document, the participant roster, remote
//! cursors and chat.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────────────┐
//!  editor / UI ──►│ RoomSession                              │
//!   intents       │  ├─ DocumentSync   (version, echo gate)  │
//!                 │  ├─ Presence       (roster, cursors)     │
//!                 │  ├─ ChatLog        (append-only)         │
//!                 │  └─ ConnectionManager ◄── AuthProvider   │
//!                 └──────────────┬───────────────────────────┘
//!                                │ Transport / Connector
//!                                ▼
//!                     WsConnector (tokio-tungstenite)
//!                                │  JSON frames
//!                                ▼
//!                         room authority
//! ```
//!
//! The authority resolves concurrent edits. The client keeps version
//! bookkeeping only: last accepted write wins, and divergence is repaired by
//! the server's `room:resync`.
//!
//! ## Modules
//!
//! - [`protocol`]: wire events and identifiers
//! - [`connection`]: connection lifecycle, join/re-join, single token refresh
//! - [`document`]: document state and the editor loop-avoidance gate
//! - [`presence`]: roster, remote cursors, outbound cursor throttle
//! - [`chat`]: chat validation and log
//! - [`session`]: per-room façade over all of the above
//! - [`transport`]: transport traits, WebSocket and in-memory connectors
//! - [`auth`]: login-scoped credentials
//! - [`config`]: session tunables

pub mod auth;
pub mod chat;
pub mod config;
pub mod connection;
pub mod document;
pub mod presence;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use auth::{AuthContext, AuthError, AuthProvider};
pub use chat::{ChatLog, InputRejection};
pub use config::{ConfigError, SessionConfig};
pub use connection::{ConnectionError, ConnectionManager, ConnectionState};
pub use document::{DocumentState, DocumentSync, EditGate, EditorWidget};
pub use presence::{CursorThrottle, Presence};
pub use protocol::{
    ChatMessage, ClientIntent, CursorPosition, Participant, ParticipantId, ProtocolError, RoomId,
    ServerEvent,
};
pub use session::{RoomSession, SendOutcome, SessionUpdate};
pub use transport::{
    Connector, MemoryConnector, Transport, TransportError, TransportEvent, WsConnector,
};
