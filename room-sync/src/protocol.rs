//! JSON wire protocol spoken with the room authority.
//!
//! Every frame is a WebSocket text message:
//! ```text
//! { "event": "room:edit", "data": { "roomId": "…", "patch": "…", "version": 4 } }
//! ```
//!
//! Inbound frames decode into [`ServerEvent`], outbound intents encode from
//! [`ClientIntent`]. Field names on the wire are camelCase.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ───────────────────────────────────────────────────────────────────
// Identifiers
// ───────────────────────────────────────────────────────────────────

/// Room identifier, opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Participant (user) identifier as issued by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ───────────────────────────────────────────────────────────────────
// Payloads
// ───────────────────────────────────────────────────────────────────

/// A connected participant and the transport session carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: ParticipantId,
    pub socket_id: String,
}

impl Participant {
    pub fn new(user_id: impl Into<String>, socket_id: impl Into<String>) -> Self {
        Self {
            user_id: ParticipantId::new(user_id),
            socket_id: socket_id.into(),
        }
    }
}

/// Editor cursor position. `ch` is the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub ch: u32,
}

impl CursorPosition {
    pub fn new(line: u32, ch: u32) -> Self {
        Self { line, ch }
    }
}

/// Baseline snapshot sent after a successful `room:join`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    pub document: String,
    pub version: u64,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceChanged {
    pub participants: Vec<Participant>,
}

/// Whole-document update broadcast by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdated {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    pub patch: String,
    pub version: u64,
    #[serde(rename = "userId", alias = "originParticipantId")]
    pub origin: ParticipantId,
}

/// Server-forced replacement of the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResync {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    pub document: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSender {
    pub id: ParticipantId,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(rename = "userId", alias = "senderId")]
    pub sender_id: ParticipantId,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "user", alias = "sender")]
    pub sender: ChatSender,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorUpdate {
    #[serde(rename = "userId", alias = "participantId")]
    pub origin: ParticipantId,
    pub cursor: CursorPosition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kicked {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

/// Error reported by the authority for a rejected intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFault {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub message: String,
}

// ───────────────────────────────────────────────────────────────────
// Frames
// ───────────────────────────────────────────────────────────────────

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "room:joined")]
    Joined(RoomJoined),
    #[serde(rename = "room:presence")]
    Presence(PresenceChanged),
    #[serde(rename = "room:edit")]
    DocumentUpdated(DocumentUpdated),
    #[serde(rename = "room:resync")]
    Resync(DocumentResync),
    #[serde(rename = "room:new-message")]
    ChatPosted(ChatMessage),
    #[serde(rename = "room:cursor-update")]
    CursorMoved(CursorUpdate),
    /// `data` may be absent or null.
    #[serde(rename = "room:kicked")]
    Kicked(Option<Kicked>),
    #[serde(rename = "error")]
    Error(ServerFault),
}

impl ServerEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Joined(_) => "room:joined",
            ServerEvent::Presence(_) => "room:presence",
            ServerEvent::DocumentUpdated(_) => "room:edit",
            ServerEvent::Resync(_) => "room:resync",
            ServerEvent::ChatPosted(_) => "room:new-message",
            ServerEvent::CursorMoved(_) => "room:cursor-update",
            ServerEvent::Kicked(_) => "room:kicked",
            ServerEvent::Error(_) => "error",
        }
    }

    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Encode to a text frame (used by test authorities and tooling).
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPayload {
    pub room_id: RoomId,
    pub patch: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub room_id: RoomId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPayload {
    pub room_id: RoomId,
    pub cursor: CursorPosition,
}

/// Client → server intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientIntent {
    #[serde(rename = "room:join")]
    Join(RoomId),
    #[serde(rename = "room:leave")]
    Leave(RoomId),
    #[serde(rename = "room:edit")]
    Edit(EditPayload),
    #[serde(rename = "room:chat")]
    Chat(ChatPayload),
    #[serde(rename = "room:cursor")]
    Cursor(CursorPayload),
}

impl ClientIntent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientIntent::Join(_) => "room:join",
            ClientIntent::Leave(_) => "room:leave",
            ClientIntent::Edit(_) => "room:edit",
            ClientIntent::Chat(_) => "room:chat",
            ClientIntent::Cursor(_) => "room:cursor",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_room_joined() {
        let text = json!({
            "event": "room:joined",
            "data": {
                "roomId": "r1",
                "document": "fn main() {}",
                "version": 7,
                "participants": [{ "userId": "u1", "socketId": "s1" }]
            }
        })
        .to_string();

        match ServerEvent::decode(&text).unwrap() {
            ServerEvent::Joined(joined) => {
                assert_eq!(joined.room_id, Some(RoomId::new("r1")));
                assert_eq!(joined.document, "fn main() {}");
                assert_eq!(joined.version, 7);
                assert_eq!(joined.participants, vec![Participant::new("u1", "s1")]);
            }
            other => panic!("expected Joined, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_edit_origin_aliases() {
        let wire = r#"{"event":"room:edit","data":{"patch":"x","version":3,"userId":"u2"}}"#;
        let aliased =
            r#"{"event":"room:edit","data":{"patch":"x","version":3,"originParticipantId":"u2"}}"#;

        for text in [wire, aliased] {
            match ServerEvent::decode(text).unwrap() {
                ServerEvent::DocumentUpdated(update) => {
                    assert_eq!(update.origin, ParticipantId::new("u2"));
                    assert_eq!(update.version, 3);
                    assert!(update.room_id.is_none());
                }
                other => panic!("expected DocumentUpdated, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_decode_chat_message() {
        let text = json!({
            "event": "room:new-message",
            "data": {
                "id": "m1",
                "content": "hello",
                "roomId": "r1",
                "userId": "u1",
                "createdAt": "2024-03-01T12:00:00.000Z",
                "user": { "id": "u1", "displayName": "Ada", "avatarUrl": null }
            }
        })
        .to_string();

        match ServerEvent::decode(&text).unwrap() {
            ServerEvent::ChatPosted(msg) => {
                assert_eq!(msg.id, "m1");
                assert_eq!(msg.sender_id, ParticipantId::new("u1"));
                assert_eq!(msg.sender.display_name, "Ada");
                assert!(msg.sender.avatar_url.is_none());
                assert_eq!(msg.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
            }
            other => panic!("expected ChatPosted, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_kicked_with_and_without_payload() {
        let with_room = r#"{"event":"room:kicked","data":{"roomId":"r1"}}"#;
        let empty = r#"{"event":"room:kicked","data":{}}"#;

        assert_eq!(
            ServerEvent::decode(with_room).unwrap(),
            ServerEvent::Kicked(Some(Kicked { room_id: Some(RoomId::new("r1")) }))
        );
        assert_eq!(
            ServerEvent::decode(empty).unwrap(),
            ServerEvent::Kicked(Some(Kicked::default()))
        );
    }

    #[test]
    fn test_decode_kicked_without_data() {
        for text in [
            r#"{"event":"room:kicked"}"#,
            r#"{"event":"room:kicked","data":null}"#,
        ] {
            assert_eq!(ServerEvent::decode(text).unwrap(), ServerEvent::Kicked(None));
        }
    }

    #[test]
    fn test_decode_cursor_and_error() {
        let cursor = r#"{"event":"room:cursor-update","data":{"userId":"u3","cursor":{"line":4,"ch":2}}}"#;
        let error = r#"{"event":"error","data":{"event":"room:edit","message":"stale"}}"#;

        assert_eq!(
            ServerEvent::decode(cursor).unwrap(),
            ServerEvent::CursorMoved(CursorUpdate {
                origin: ParticipantId::new("u3"),
                cursor: CursorPosition::new(4, 2),
            })
        );
        match ServerEvent::decode(error).unwrap() {
            ServerEvent::Error(fault) => {
                assert_eq!(fault.event, "room:edit");
                assert_eq!(fault.message, "stale");
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_event() {
        let err = ServerEvent::decode(r#"{"event":"room:teleport","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
        assert!(ServerEvent::decode("not json").is_err());
    }

    #[test]
    fn test_encode_join_is_bare_room_id() {
        let text = ClientIntent::Join(RoomId::new("r1")).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({ "event": "room:join", "data": "r1" }));
    }

    #[test]
    fn test_encode_edit_uses_camel_case() {
        let intent = ClientIntent::Edit(EditPayload {
            room_id: RoomId::new("r1"),
            patch: "ab".into(),
            version: 0,
        });
        let value: serde_json::Value = serde_json::from_str(&intent.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "event": "room:edit", "data": { "roomId": "r1", "patch": "ab", "version": 0 } })
        );
    }

    #[test]
    fn test_encode_cursor() {
        let intent = ClientIntent::Cursor(CursorPayload {
            room_id: RoomId::new("r1"),
            cursor: CursorPosition::new(1, 9),
        });
        let value: serde_json::Value = serde_json::from_str(&intent.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "event": "room:cursor", "data": { "roomId": "r1", "cursor": { "line": 1, "ch": 9 } } })
        );
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ClientIntent::Leave(RoomId::new("r")).name(), "room:leave");
        assert_eq!(ServerEvent::Kicked(None).name(), "room:kicked");
    }
}
