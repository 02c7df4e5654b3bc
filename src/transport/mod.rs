//! Chat transports feeding the session engine.

use thiserror::Error;

pub mod irc;

/// A line of chat received from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Display name or login of the author.
    pub sender: String,
    /// Raw text as typed.
    pub text: String,
}

/// Errors raised while talking to the chat server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server did not accept the connection in time.
    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),
    /// Socket level failure.
    #[error("chat connection failed: {0}")]
    Io(#[from] std::io::Error),
}
