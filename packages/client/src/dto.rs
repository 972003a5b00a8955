//! Data Transfer Objects (DTOs) for the HTTP and realtime collaborators.
//!
//! Field names follow the wire format exactly; the rest of the crate works on
//! the domain types in [`crate::domain`], converted at this boundary.

use serde::{Deserialize, Serialize};

use crate::domain::{Message, MessageKind, OnlineUser};

// ========================================
// HTTP
// ========================================

/// `POST /api/auth/register` request body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub username: String,
}

/// `POST /api/auth/register` response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterResponse {
    pub id: i64,
}

/// `GET /api/messages/pull` response body
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Option<Vec<MessagePayload>>,
}

// ========================================
// Realtime
// ========================================

/// A chat message as carried by `message` events and the history endpoint
///
/// Every field is optional on input; senders are free to omit what they do
/// not know.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePayload {
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub recipient_id: Option<i64>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

/// Outbound `send_message` payload
///
/// `recipient_id` serializes as `null` for a broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessagePayload {
    pub sender_id: i64,
    pub recipient_id: Option<i64>,
    pub text: String,
    pub username: String,
    pub timestamp: i64,
}

/// Payload of `user_joined`, `user_left`, and each `online_users` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPayload {
    pub id: i64,
    #[serde(default)]
    pub username: String,
}

/// Payload of `typing`, `stop_typing`, `user_typing`, `user_stop_typing`, and `auth`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityPayload {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
}

/// Auth metadata attached to the Socket.IO connect packet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectAuth {
    #[serde(rename = "userId")]
    pub user_id: i64,
}

// ========================================
// DTO ↔ Domain
// ========================================

impl From<MessagePayload> for Message {
    fn from(dto: MessagePayload) -> Self {
        let kind = match dto.r#type.as_deref() {
            Some("system") => MessageKind::System,
            _ => MessageKind::Chat,
        };
        Self {
            sender_id: dto.sender_id,
            recipient_id: dto.recipient_id,
            text: dto.text,
            username: dto.username,
            timestamp: dto.timestamp,
            kind,
        }
    }
}

impl From<UserPayload> for OnlineUser {
    fn from(dto: UserPayload) -> Self {
        Self {
            id: dto.id,
            username: dto.username,
        }
    }
}
