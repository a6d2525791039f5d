//! Error types for the event stream connection.

use misty_types::{ClassificationError, EventType};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors raised while talking to the robot's event socket.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The socket could not be opened.
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    /// The socket failed while waiting for the next frame.
    #[error("Event stream failed: {0}")]
    Transport(#[source] tungstenite::Error),

    /// A subscribe or unsubscribe frame could not be written.
    #[error("Failed to {operation} {event_type}: {source}")]
    Send {
        operation: &'static str,
        event_type: EventType,
        #[source]
        source: tungstenite::Error,
    },

    /// An inbound frame did not match any known envelope shape.
    #[error(transparent)]
    Protocol(#[from] ClassificationError),

    #[error("Failed to encode control frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RealtimeError {
    /// True for failures of the socket itself, as opposed to bad frame content.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RealtimeError::Connect { .. } | RealtimeError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RealtimeError>;
