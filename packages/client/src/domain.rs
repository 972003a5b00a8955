//! Client-side chat state and its transitions.
//!
//! Everything here is pure: inbound events are decoded into [`InboundEvent`]
//! and folded into [`ChatState`] by [`ChatState::apply`], which reports what
//! changed so the caller can render and drive the typing timer.

use std::time::Duration;

use serde_json::Value;

use crate::dto::{IdentityPayload, MessagePayload, UserPayload};

/// Quiet period after which a typing indicator clears itself
pub const TYPING_QUIET_PERIOD: Duration = Duration::from_millis(3000);

// ========================================
// Session
// ========================================

/// Realtime connection state, as observed from the transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Local identity and connection status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    /// Absent until registration succeeds
    pub user_id: Option<i64>,
    pub connection_state: ConnectionState,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }
}

// ========================================
// Messages
// ========================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageKind {
    #[default]
    Chat,
    System,
}

/// One entry of the message log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Absent for system messages
    pub sender_id: Option<i64>,
    /// Absent for broadcasts
    pub recipient_id: Option<i64>,
    pub text: String,
    /// Display only
    pub username: Option<String>,
    /// Unix timestamp (milliseconds)
    pub timestamp: i64,
    pub kind: MessageKind,
}

impl Message {
    /// Build a locally synthesized system message
    pub fn system(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            sender_id: None,
            recipient_id: None,
            text: text.into(),
            username: None,
            timestamp,
            kind: MessageKind::System,
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }
}

// ========================================
// Presence
// ========================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineUser {
    pub id: i64,
    pub username: String,
}

/// Online users keyed by id, kept in arrival order for display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    users: Vec<OnlineUser>,
}

impl Roster {
    /// Insert a user, replacing any entry with the same id in place
    pub fn insert(&mut self, user: OnlineUser) {
        match self.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user,
            None => self.users.push(user),
        }
    }

    /// Remove the user with `id`, returning whether one was present
    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u.id != id);
        self.users.len() != before
    }

    /// Replace the whole roster; duplicate ids keep the last entry
    pub fn replace(&mut self, users: Vec<OnlineUser>) {
        self.users.clear();
        for user in users {
            self.insert(user);
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OnlineUser> {
        self.users.iter()
    }
}

/// The single most recent remote typer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingIndicator {
    pub user_id: i64,
    pub username: String,
}

// ========================================
// Inbound events
// ========================================

/// A decoded inbound realtime event
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Message(Message),
    Ack(Value),
    UserJoined(OnlineUser),
    UserLeft(OnlineUser),
    UserTyping(TypingIndicator),
    UserStopTyping { user_id: i64 },
    OnlineUsers(Vec<OnlineUser>),
}

impl InboundEvent {
    /// Decode an event by name.
    ///
    /// Returns `Ok(None)` for event names the client does not handle and an
    /// error when a known event carries a payload of the wrong shape.
    pub fn decode(name: &str, data: Value) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            "message" => {
                let payload: MessagePayload = serde_json::from_value(data)?;
                Self::Message(payload.into())
            }
            "ack" => Self::Ack(data),
            "user_joined" => {
                let payload: UserPayload = serde_json::from_value(data)?;
                Self::UserJoined(payload.into())
            }
            "user_left" => {
                let payload: UserPayload = serde_json::from_value(data)?;
                Self::UserLeft(payload.into())
            }
            "user_typing" => {
                let payload: IdentityPayload = serde_json::from_value(data)?;
                Self::UserTyping(TypingIndicator {
                    user_id: payload.user_id,
                    username: payload.username,
                })
            }
            "user_stop_typing" => {
                let payload: IdentityPayload = serde_json::from_value(data)?;
                Self::UserStopTyping {
                    user_id: payload.user_id,
                }
            }
            "online_users" => {
                let payload: Vec<UserPayload> = serde_json::from_value(data)?;
                Self::OnlineUsers(payload.into_iter().map(OnlineUser::from).collect())
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// What an applied event changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    /// One message was appended to the log
    MessageAppended,
    /// The roster changed and a system message was appended
    Presence,
    /// The roster was replaced wholesale
    RosterReplaced,
    /// The typing indicator was set; the auto-clear timer must be re-armed
    TypingStarted,
    /// The typing indicator was cleared; the auto-clear timer must be cancelled
    TypingStopped,
    /// The connection state flipped
    ConnectionChanged,
}

// ========================================
// State
// ========================================

/// Complete client-side view state
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub session: Session,
    messages: Vec<Message>,
    roster: Roster,
    typing: Option<TypingIndicator>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn typing(&self) -> Option<&TypingIndicator> {
        self.typing.as_ref()
    }

    /// Record a successful registration
    pub fn authenticate(&mut self, username: impl Into<String>, user_id: i64) {
        self.session.username = username.into();
        self.session.user_id = Some(user_id);
    }

    /// Record a transport state change, returning whether it differed
    pub fn set_connection_state(&mut self, state: ConnectionState) -> bool {
        let changed = self.session.connection_state != state;
        self.session.connection_state = state;
        changed
    }

    /// Replace the message log wholesale with pulled history
    pub fn replace_history(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Whether `message` was sent by the local user
    pub fn is_own(&self, message: &Message) -> bool {
        !message.is_system()
            && message.sender_id.is_some()
            && message.sender_id == self.session.user_id
    }

    /// Clear the typing indicator, returning whether one was shown
    pub fn clear_typing(&mut self) -> bool {
        self.typing.take().is_some()
    }

    /// Fold one inbound event into the state.
    ///
    /// `now` is used to timestamp synthesized system messages.
    pub fn apply(&mut self, event: InboundEvent, now: i64) -> Change {
        match event {
            InboundEvent::Message(message) => {
                self.messages.push(message);
                Change::MessageAppended
            }
            InboundEvent::Ack(ack) => {
                tracing::debug!("Message acknowledged: {}", ack);
                Change::Unchanged
            }
            InboundEvent::UserJoined(user) => {
                let text = format!("{} joined the chat", user.username);
                self.roster.insert(user);
                self.messages.push(Message::system(text, now));
                Change::Presence
            }
            InboundEvent::UserLeft(user) => {
                let text = format!("{} left the chat", user.username);
                self.roster.remove(user.id);
                self.messages.push(Message::system(text, now));
                Change::Presence
            }
            InboundEvent::UserTyping(indicator) => {
                if self.is_local_user(indicator.user_id) {
                    return Change::Unchanged;
                }
                self.typing = Some(indicator);
                Change::TypingStarted
            }
            InboundEvent::UserStopTyping { user_id } => {
                if self.is_local_user(user_id) {
                    return Change::Unchanged;
                }
                self.typing = None;
                Change::TypingStopped
            }
            InboundEvent::OnlineUsers(users) => {
                self.roster.replace(users);
                Change::RosterReplaced
            }
        }
    }

    fn is_local_user(&self, user_id: i64) -> bool {
        self.session.user_id == Some(user_id)
    }
}
