//! Session configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Tunables for one room session and its transport.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// WebSocket endpoint of the room authority
    pub server_url: String,
    /// Largest outbound edit, in UTF-8 bytes
    pub max_edit_bytes: usize,
    /// Longest outbound chat message, in characters after trimming
    pub max_message_chars: usize,
    /// Minimum spacing between outbound cursor updates
    pub cursor_throttle_ms: u64,
    /// Reconnect attempts before the transport gives up
    pub reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay_ms: u64,
    /// Outbound frame channel capacity
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:4000/realtime".to_string(),
            max_edit_bytes: 50 * 1024,
            max_message_chars: 2000,
            cursor_throttle_ms: 75,
            reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
            outbound_capacity: 256,
        }
    }
}

impl SessionConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Parse)
    }

    pub fn cursor_throttle(&self) -> Duration {
        Duration::from_millis(self.cursor_throttle_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
