//! Document synchronization engine.
//!
//! The document is a whole string with a server-assigned version. Inbound
//! events replace it wholesale; local edits are sent as the full new text
//! tagged with the local version counter.
//!
//! ```text
//!   inbound event ──► DocumentState ──► EditGate::ApplyingRemote ──► editor.set_content()
//!                                                                        │
//!   editor change ◄──────────────────────────────────────────────────────┘
//!        │
//!        ├─ gate was ApplyingRemote → Idle, nothing sent (echo of our own write)
//!        └─ gate was Idle           → edit(room, text, local_version); local_version += 1
//! ```

use crate::protocol::{DocumentResync, DocumentUpdated, ParticipantId, RoomJoined};

/// Host editor widget.
pub trait EditorWidget {
    /// Replace the editor contents programmatically.
    ///
    /// Implementations may synchronously raise their change notification;
    /// the host forwards it to the session afterwards as usual.
    fn set_content(&mut self, content: &str);
}

/// Server-authoritative document state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentState {
    pub content: String,
    pub version: u64,
}

/// Loop-avoidance latch between the engine and the editor change handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditGate {
    #[default]
    Idle,
    /// The next change notification was caused by the engine.
    ApplyingRemote,
}

/// Result of applying an inbound document event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// State replaced; the editor needs the new content.
    Replaced,
    /// Our own edit coming back from the authority.
    Echo,
    /// Version older than the last accepted event; ignored.
    Stale,
}

#[derive(Debug, Default)]
pub struct DocumentSync {
    state: DocumentState,
    /// Advisory counter for outbound edits; corrected by every inbound event.
    local_version: u64,
    gate: EditGate,
}

impl DocumentSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn content(&self) -> &str {
        &self.state.content
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn local_version(&self) -> u64 {
        self.local_version
    }

    pub fn gate(&self) -> EditGate {
        self.gate
    }

    /// Baseline snapshot from `room:joined`.
    pub fn apply_snapshot(&mut self, joined: &RoomJoined) -> Applied {
        self.replace(&joined.document, joined.version);
        Applied::Replaced
    }

    /// Conditional apply of a `room:edit` broadcast.
    ///
    /// Updates are ordered against the version of the last accepted event.
    /// A snapshot or resync resets that baseline, so a server that restarts
    /// its sequence keeps converging.
    pub fn apply_update(&mut self, update: &DocumentUpdated, local: Option<&ParticipantId>) -> Applied {
        if local == Some(&update.origin) {
            return Applied::Echo;
        }
        if update.version < self.state.version {
            log::debug!(
                "ignoring stale update v{} (holding v{})",
                update.version,
                self.state.version
            );
            return Applied::Stale;
        }
        self.state.content.clone_from(&update.patch);
        self.state.version = update.version;
        self.local_version = update.version;
        Applied::Replaced
    }

    /// Unconditional apply of `room:resync`; wins over any local counter.
    pub fn apply_resync(&mut self, resync: &DocumentResync) -> Applied {
        self.replace(&resync.document, resync.version);
        Applied::Replaced
    }

    fn replace(&mut self, content: &str, version: u64) {
        content.clone_into(&mut self.state.content);
        self.state.version = version;
        self.local_version = version;
    }

    /// Push the current content into the editor, arming the gate first.
    pub fn push_to_editor<E: EditorWidget + ?Sized>(&mut self, editor: &mut E) {
        self.gate = EditGate::ApplyingRemote;
        editor.set_content(&self.state.content);
    }

    /// Consume the gate on a change notification.
    ///
    /// Returns `true` when the notification came from [`push_to_editor`] and
    /// must not be transmitted. The gate is always `Idle` afterwards.
    ///
    /// [`push_to_editor`]: DocumentSync::push_to_editor
    pub fn take_remote_change(&mut self) -> bool {
        std::mem::take(&mut self.gate) == EditGate::ApplyingRemote
    }

    /// Claim the version for an outbound edit and advance the counter.
    pub fn next_edit_version(&mut self) -> u64 {
        let version = self.local_version;
        self.local_version += 1;
        version
    }
}
