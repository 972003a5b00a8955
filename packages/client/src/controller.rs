//! The chat client state machine.
//!
//! [`ChatClient`] owns the view state, the HTTP collaborator, the realtime
//! connection, and the typing timer. It is driven by one event loop: every
//! user action, transport event, and timer fire is handled to completion
//! before the next.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use chatterx_shared::time::{Clock, SystemClock};

use crate::{
    api::ChatApi,
    config::ClientConfig,
    domain::{Change, ChatState, ConnectionState, InboundEvent, Message, TYPING_QUIET_PERIOD},
    dto::{ConnectAuth, IdentityPayload, SendMessagePayload},
    error::ClientError,
    transport::{RealtimeLink, TransportEvent},
    typing::{TimerGeneration, TypingTimer},
};

/// Outcome of the history pull that follows registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryStatus {
    /// History loading is disabled
    Skipped,
    /// The response carried no message list; the log is untouched
    Absent,
    /// The log was replaced with this many messages
    Loaded(usize),
    /// The pull failed; the log is untouched
    Failed(String),
}

/// Result of a successful [`ChatClient::register`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub user_id: i64,
    pub history: HistoryStatus,
}

/// Chat client bound to one HTTP collaborator and one realtime connection
pub struct ChatClient<A, L> {
    state: ChatState,
    api: Arc<A>,
    link: L,
    timer: TypingTimer,
    clock: Box<dyn Clock>,
    load_history: bool,
    draft: String,
    recipient_id: Option<i64>,
}

impl<A, L> ChatClient<A, L>
where
    A: ChatApi,
    L: RealtimeLink,
{
    /// Create an unauthenticated client.
    ///
    /// Typing timer fires are reported on `timer_fired`; the event loop must
    /// hand them back through [`ChatClient::handle_timer_fire`].
    pub fn new(
        config: &ClientConfig,
        api: A,
        link: L,
        timer_fired: mpsc::UnboundedSender<TimerGeneration>,
    ) -> Self {
        Self {
            state: ChatState::new(),
            api: Arc::new(api),
            link,
            timer: TypingTimer::new(TYPING_QUIET_PERIOD, timer_fired),
            clock: Box::new(SystemClock),
            load_history: config.load_history,
            draft: String::new(),
            recipient_id: None,
        }
    }

    /// Replace the clock used for outbound and system message timestamps
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn recipient_id(&self) -> Option<i64> {
        self.recipient_id
    }

    /// Shared handle to the HTTP collaborator, for requests run off the loop
    pub fn api(&self) -> Arc<A> {
        Arc::clone(&self.api)
    }

    /// Whether registration is followed by a history pull
    pub fn loads_history(&self) -> bool {
        self.load_history
    }

    // ========================================
    // Registration
    // ========================================

    /// Register `username`, open the realtime connection, and pull history.
    ///
    /// A blank username is rejected without any network call. A failed
    /// registration leaves the session unauthenticated. A failed history pull
    /// does not undo the registration and is reported in the outcome.
    pub async fn register(&mut self, username: &str) -> Result<Registered, ClientError> {
        let username = check_username(username)?;
        if let Some(user_id) = self.state.session.user_id {
            tracing::warn!("Already registered as {}", user_id);
            return Ok(Registered {
                user_id,
                history: HistoryStatus::Skipped,
            });
        }

        let user_id = self.api.register(&username).await.inspect_err(|e| {
            tracing::error!("Registration error: {}", e);
        })?;
        self.complete_registration(&username, user_id)?;

        let history = if self.load_history {
            let pulled = self.api.pull_history().await;
            self.apply_history(pulled)
        } else {
            HistoryStatus::Skipped
        };
        Ok(Registered { user_id, history })
    }

    /// Adopt the id the server assigned: open the connection, then store the
    /// identity and announce it with `auth`.
    ///
    /// The session stays unauthenticated when the connection cannot be opened.
    pub fn complete_registration(&mut self, username: &str, user_id: i64) -> Result<(), ClientError> {
        let auth = serde_json::to_value(ConnectAuth { user_id }).unwrap_or(Value::Null);
        self.link.connect(auth).inspect_err(|e| {
            tracing::error!("Could not open the realtime connection: {}", e);
        })?;

        tracing::info!("Registered '{}' with id {}", username, user_id);
        self.state.authenticate(username, user_id);
        self.emit_identity("auth");
        Ok(())
    }

    /// Fold the result of a history pull into the log
    pub fn apply_history(
        &mut self,
        pulled: Result<Option<Vec<Message>>, ClientError>,
    ) -> HistoryStatus {
        match pulled {
            Ok(Some(messages)) => {
                let count = messages.len();
                self.state.replace_history(messages);
                tracing::debug!("Loaded {} messages of history", count);
                HistoryStatus::Loaded(count)
            }
            Ok(None) => HistoryStatus::Absent,
            Err(e) => {
                tracing::warn!("{}", e);
                HistoryStatus::Failed(e.to_string())
            }
        }
    }

    // ========================================
    // Outbound actions
    // ========================================

    /// Set the recipient for the compose row; blank input means broadcast
    pub fn set_recipient(&mut self, raw: &str) -> Result<Option<i64>, ClientError> {
        let raw = raw.trim();
        self.recipient_id = if raw.is_empty() {
            None
        } else {
            Some(
                raw.parse::<i64>()
                    .map_err(|_| ClientError::InvalidRecipient(raw.to_string()))?,
            )
        };
        Ok(self.recipient_id)
    }

    /// Record the compose buffer after a keystroke and signal typing
    pub fn edit_draft(&mut self, text: &str) {
        self.draft = text.to_string();
        if !self.draft.trim().is_empty() {
            self.typing();
        }
    }

    /// Send the compose buffer to the selected recipient
    pub fn submit_draft(&mut self) -> Result<SendMessagePayload, ClientError> {
        let text = self.draft.clone();
        self.send_message(&text, self.recipient_id)
    }

    /// Emit one `send_message` event.
    ///
    /// The log is not touched: the message appears once the server echoes it
    /// back as a `message` event. On success the compose buffer is cleared and
    /// `stop_typing` is emitted.
    pub fn send_message(
        &mut self,
        text: &str,
        recipient_id: Option<i64>,
    ) -> Result<SendMessagePayload, ClientError> {
        let sender_id = self.state.session.user_id.ok_or(ClientError::NotRegistered)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let payload = SendMessagePayload {
            sender_id,
            recipient_id,
            text: text.to_string(),
            username: self.state.session.username.clone(),
            timestamp: self.clock.now_millis(),
        };
        let data = serde_json::to_value(&payload).unwrap_or(Value::Null);
        self.link.emit("send_message", data)?;

        self.draft.clear();
        self.stop_typing();
        Ok(payload)
    }

    /// Emit `typing`; returns whether anything was emitted
    pub fn typing(&self) -> bool {
        self.emit_identity("typing")
    }

    /// Emit `stop_typing`; returns whether anything was emitted
    pub fn stop_typing(&self) -> bool {
        self.emit_identity("stop_typing")
    }

    fn emit_identity(&self, event: &str) -> bool {
        let Some(user_id) = self.state.session.user_id else {
            return false;
        };
        let payload = IdentityPayload {
            user_id,
            username: self.state.session.username.clone(),
        };
        let data = serde_json::to_value(payload).unwrap_or(Value::Null);
        match self.link.emit(event, data) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Could not emit '{}': {}", event, e);
                false
            }
        }
    }

    // ========================================
    // Inbound
    // ========================================

    /// Fold one transport notification into the state
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Change {
        match event {
            TransportEvent::Connected => self.set_connection_state(ConnectionState::Connected),
            TransportEvent::Disconnected(reason) => {
                tracing::info!("Disconnected: {}", reason);
                self.set_connection_state(ConnectionState::Disconnected)
            }
            TransportEvent::Event { name, data } => match InboundEvent::decode(&name, data) {
                Ok(Some(event)) => {
                    let change = self.state.apply(event, self.clock.now_millis());
                    match change {
                        Change::TypingStarted => self.timer.arm(),
                        Change::TypingStopped => self.timer.cancel(),
                        _ => {}
                    }
                    change
                }
                Ok(None) => {
                    tracing::debug!("Ignoring unknown event '{}'", name);
                    Change::Unchanged
                }
                Err(e) => {
                    tracing::warn!("Dropping malformed '{}' payload: {}", name, e);
                    Change::Unchanged
                }
            },
        }
    }

    /// Handle a typing timer fire reported on the timer channel
    pub fn handle_timer_fire(&mut self, generation: TimerGeneration) -> Change {
        if self.timer.accept(generation) && self.state.clear_typing() {
            Change::TypingStopped
        } else {
            Change::Unchanged
        }
    }

    fn set_connection_state(&mut self, state: ConnectionState) -> Change {
        if self.state.set_connection_state(state) {
            Change::ConnectionChanged
        } else {
            Change::Unchanged
        }
    }

    // ========================================
    // Teardown
    // ========================================

    /// Close the connection and cancel the typing timer
    pub async fn teardown(&mut self) {
        self.timer.cancel();
        self.link.close().await;
        self.state
            .set_connection_state(ConnectionState::Disconnected);
        tracing::debug!("Client torn down");
    }
}

/// Trim `username` and reject it when nothing is left
pub fn check_username(username: &str) -> Result<String, ClientError> {
    let username = username.trim();
    if username.is_empty() {
        tracing::warn!("Rejected registration with an empty username");
        return Err(ClientError::EmptyUsername);
    }
    Ok(username.to_string())
}
