//! Error types for the signaling relay

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur while running the server
#[derive(Error, Debug)]
pub enum SignalingError {
    /// Failed to bind or accept on the listening socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Errors from client requests
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// Connection was closed
    #[error("Connection closed")]
    Close,

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request parsed but carries unusable values
    #[error("Malformed request: {0}")]
    Malformed(String),

    /// Unsupported message type
    #[error("Unsupported message type")]
    UnsupportedType,

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

impl ClientRequestError {
    /// Whether the connection can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientRequestError::Json(_)
                | ClientRequestError::Malformed(_)
                | ClientRequestError::UnsupportedType
        )
    }
}
