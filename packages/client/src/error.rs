//! Error types for the chat client.

use thiserror::Error;

/// Client-specific errors
///
/// Every variant is scoped to the user action that triggered it; none of them
/// is fatal to the process.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Username is empty or whitespace
    #[error("Please enter a username")]
    EmptyUsername,

    /// Message text is empty or whitespace
    #[error("Message is empty")]
    EmptyMessage,

    /// An action needing identity was attempted before registration
    #[error("Please register first")]
    NotRegistered,

    /// Recipient id could not be parsed
    #[error("Invalid recipient id '{0}'")]
    InvalidRecipient(String),

    /// Registration request failed
    #[error("Registration failed: {0}")]
    Registration(String),

    /// History pull failed
    #[error("Failed to load message history: {0}")]
    History(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Emit attempted before the realtime connection was opened
    #[error("Realtime connection is not open")]
    NotConnected,
}
