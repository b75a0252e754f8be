//! Chat stream: validated outbound messages, append-only inbound log.

use crate::protocol::ChatMessage;

/// Local input refused before reaching the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputRejection {
    #[error("edit of {size} bytes exceeds the {limit} byte limit")]
    EditTooLarge { size: usize, limit: usize },
    #[error("message is empty")]
    EmptyMessage,
    #[error("message of {len} characters exceeds the {limit} character limit")]
    MessageTooLong { len: usize, limit: usize },
}

/// Trim and bound-check an outbound chat message.
pub fn prepare_message(content: &str, max_chars: usize) -> Result<String, InputRejection> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(InputRejection::EmptyMessage);
    }
    let len = trimmed.chars().count();
    if len > max_chars {
        return Err(InputRejection::MessageTooLong {
            len,
            limit: max_chars,
        });
    }
    Ok(trimmed.to_string())
}

/// Messages in arrival order. No dedup, no reordering.
#[derive(Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Forget history; only done on (re)join.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ChatSender, ParticipantId};
    use chrono::{TimeZone, Utc};

    fn message(id: &str, secs: i64) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            content: format!("msg {id}"),
            room_id: None,
            sender_id: ParticipantId::new("u1"),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            sender: ChatSender {
                id: ParticipantId::new("u1"),
                display_name: "Ada".into(),
                avatar_url: None,
            },
        }
    }

    #[test]
    fn test_prepare_trims() {
        assert_eq!(prepare_message("  hi there \n", 2000).unwrap(), "hi there");
    }

    #[test]
    fn test_prepare_rejects_blank() {
        assert_eq!(prepare_message("", 2000), Err(InputRejection::EmptyMessage));
        assert_eq!(prepare_message(" \t\n ", 2000), Err(InputRejection::EmptyMessage));
    }

    #[test]
    fn test_prepare_length_bound_counts_chars_after_trim() {
        let exact = "é".repeat(2000);
        assert!(prepare_message(&format!("  {exact}  "), 2000).is_ok());

        let over = "x".repeat(2001);
        assert_eq!(
            prepare_message(&over, 2000),
            Err(InputRejection::MessageTooLong { len: 2001, limit: 2000 })
        );
    }

    #[test]
    fn test_log_keeps_arrival_order_and_duplicates() {
        let mut log = ChatLog::new();
        log.append(message("2", 20));
        log.append(message("1", 10));
        log.append(message("2", 20));

        let ids: Vec<&str> = log.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "2"]);
        assert_eq!(log.last().unwrap().id, "2");
    }

    #[test]
    fn test_reset() {
        let mut log = ChatLog::new();
        log.append(message("1", 10));
        log.reset();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
    }
}
