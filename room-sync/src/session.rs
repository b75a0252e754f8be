//! One room visit: connection, document, presence and chat state.
//!
//! The host drives a session from a single task:
//! - `next_update().await` in its event loop to process inbound traffic
//! - `editor_changed`, `cursor_moved`, `send_chat` from UI callbacks
//!
//! All state is owned here; hosts read it through accessors and never
//! mutate it directly.

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::AuthProvider;
use crate::chat::{prepare_message, ChatLog, InputRejection};
use crate::config::SessionConfig;
use crate::connection::{ConnectionError, ConnectionEvent, ConnectionManager, ConnectionState};
use crate::document::{Applied, DocumentState, DocumentSync, EditorWidget};
use crate::presence::{CursorThrottle, Presence};
use crate::protocol::{
    ChatMessage, ChatPayload, ClientIntent, CursorPayload, CursorPosition, EditPayload,
    Participant, ParticipantId, RoomId, ServerEvent,
};
use crate::transport::Connector;

/// What changed after one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Connection(ConnectionState),
    /// Baseline snapshot applied; document, roster, chat and cursors reset.
    Joined,
    /// Document content replaced and pushed into the editor.
    Document,
    /// Our own edit came back; nothing changed.
    EchoSuppressed,
    /// An out-of-date update was ignored.
    StaleUpdate,
    Roster,
    Chat,
    Cursor(ParticipantId),
    /// Our own cursor came back; ignored.
    OwnCursor,
}

/// Fate of a local intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Not connected; dropped without buffering.
    Offline,
    /// Editor change caused by a remote apply; not an edit.
    Suppressed,
    /// Cursor update inside the throttle window.
    Throttled,
    Rejected(InputRejection),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

pub struct RoomSession<C: Connector, A: AuthProvider, E: EditorWidget> {
    config: SessionConfig,
    connection: ConnectionManager<C, A>,
    document: DocumentSync,
    presence: Presence,
    chat: ChatLog,
    cursor_throttle: CursorThrottle,
    editor: E,
}

impl<C: Connector, A: AuthProvider, E: EditorWidget> RoomSession<C, A, E> {
    pub fn new(room_id: RoomId, connector: C, auth: Arc<A>, editor: E, config: SessionConfig) -> Self {
        Self {
            cursor_throttle: CursorThrottle::new(config.cursor_throttle()),
            connection: ConnectionManager::new(room_id, connector, auth),
            document: DocumentSync::new(),
            presence: Presence::new(),
            chat: ChatLog::new(),
            editor,
            config,
        }
    }

    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        self.connection.connect()
    }

    /// Tear down the transport. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Tell the authority we are leaving, then tear down.
    pub fn leave(&mut self) {
        let room = self.room_id().clone();
        self.connection.send(&ClientIntent::Leave(room));
        self.connection.disconnect();
    }

    /// Process inbound traffic until something observable changes.
    ///
    /// Returns `None` once no transport is attached (after teardown or a
    /// terminal error).
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        match self.connection.next_event().await? {
            ConnectionEvent::StateChanged(state) => Some(SessionUpdate::Connection(state)),
            ConnectionEvent::Server(event) => Some(self.apply(event)),
        }
    }

    fn apply(&mut self, event: ServerEvent) -> SessionUpdate {
        let local = self.connection.auth().participant_id();
        match event {
            ServerEvent::Joined(joined) => {
                self.document.apply_snapshot(&joined);
                self.presence.reset(joined.participants);
                self.chat.reset();
                self.document.push_to_editor(&mut self.editor);
                log::info!(
                    "joined room {} at v{}",
                    self.room_id(),
                    self.document.version()
                );
                SessionUpdate::Joined
            }
            ServerEvent::Presence(presence) => {
                self.presence.replace_roster(presence.participants);
                SessionUpdate::Roster
            }
            ServerEvent::DocumentUpdated(update) => {
                match self.document.apply_update(&update, local.as_ref()) {
                    Applied::Replaced => {
                        self.document.push_to_editor(&mut self.editor);
                        SessionUpdate::Document
                    }
                    Applied::Echo => SessionUpdate::EchoSuppressed,
                    Applied::Stale => SessionUpdate::StaleUpdate,
                }
            }
            ServerEvent::Resync(resync) => {
                self.document.apply_resync(&resync);
                self.document.push_to_editor(&mut self.editor);
                log::debug!("resynced room {} to v{}", self.room_id(), self.document.version());
                SessionUpdate::Document
            }
            ServerEvent::ChatPosted(message) => {
                self.chat.append(message);
                SessionUpdate::Chat
            }
            ServerEvent::CursorMoved(update) => {
                if self.presence.apply_cursor(&update, local.as_ref()) {
                    SessionUpdate::Cursor(update.origin)
                } else {
                    SessionUpdate::OwnCursor
                }
            }
            // Terminal frames are consumed by the connection manager.
            ServerEvent::Kicked(_) | ServerEvent::Error(_) => {
                SessionUpdate::Connection(self.connection.state())
            }
        }
    }

    /// Editor content-change notification.
    pub fn editor_changed(&mut self, content: &str) -> SendOutcome {
        if self.document.take_remote_change() {
            return SendOutcome::Suppressed;
        }
        if self.connection.state() != ConnectionState::Connected {
            return SendOutcome::Offline;
        }
        if content.len() > self.config.max_edit_bytes {
            log::debug!("dropping {} byte edit", content.len());
            return SendOutcome::Rejected(InputRejection::EditTooLarge {
                size: content.len(),
                limit: self.config.max_edit_bytes,
            });
        }

        let intent = ClientIntent::Edit(EditPayload {
            room_id: self.room_id().clone(),
            patch: content.to_string(),
            version: self.document.local_version(),
        });
        if self.connection.send(&intent) {
            self.document.next_edit_version();
            SendOutcome::Sent
        } else {
            SendOutcome::Offline
        }
    }

    /// Editor cursor-change notification.
    pub fn cursor_moved(&mut self, cursor: CursorPosition) -> SendOutcome {
        if self.connection.state() != ConnectionState::Connected {
            return SendOutcome::Offline;
        }
        if !self.cursor_throttle.admit() {
            return SendOutcome::Throttled;
        }
        let intent = ClientIntent::Cursor(CursorPayload {
            room_id: self.room_id().clone(),
            cursor,
        });
        if self.connection.send(&intent) {
            SendOutcome::Sent
        } else {
            SendOutcome::Offline
        }
    }

    pub fn send_chat(&mut self, content: &str) -> SendOutcome {
        if self.connection.state() != ConnectionState::Connected {
            return SendOutcome::Offline;
        }
        let content = match prepare_message(content, self.config.max_message_chars) {
            Ok(content) => content,
            Err(rejection) => return SendOutcome::Rejected(rejection),
        };
        let intent = ClientIntent::Chat(ChatPayload {
            room_id: self.room_id().clone(),
            content,
        });
        if self.connection.send(&intent) {
            SendOutcome::Sent
        } else {
            SendOutcome::Offline
        }
    }

    pub fn room_id(&self) -> &RoomId {
        self.connection.room_id()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn document(&self) -> &DocumentState {
        self.document.state()
    }

    /// Version the next local edit will carry.
    pub fn local_version(&self) -> u64 {
        self.document.local_version()
    }

    pub fn participants(&self) -> &[Participant] {
        self.presence.roster()
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    /// Forget cursors of participants no longer on the roster.
    pub fn prune_departed_cursors(&mut self) -> Vec<ParticipantId> {
        self.presence.prune_departed_cursors()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.chat.messages()
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn connector(&self) -> &C {
        self.connection.connector()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
