//! Text rendering of the client view state.
//!
//! Own, other, and system messages are told apart by comparing the sender id
//! with the local session, never by anything the server asserts.

use chatterx_shared::time::format_local_time;

use crate::domain::{ChatState, Message, Roster, Session, TypingIndicator};

const TITLE: &str = "💬 ChatterX";
const RULE: &str = "============================================================";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the auth gate shown before registration
    pub fn format_auth_gate() -> String {
        format!(
            "\n{rule}\n{title}\nJoin the conversation\n{rule}\n",
            rule = RULE,
            title = TITLE
        )
    }

    /// Format the header: title, connection dot, and identity
    pub fn format_header(session: &Session) -> String {
        let (dot, status) = if session.is_connected() {
            ("●", "Connected")
        } else {
            ("○", "Disconnected")
        };
        let id = session
            .user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{rule}\n{title}  {dot} {status}  |  {name} (ID: {id})\n{rule}\n",
            rule = RULE,
            title = TITLE,
            dot = dot,
            status = status,
            name = session.username,
            id = id
        )
    }

    /// Format a connection state change notification
    pub fn format_connection(session: &Session) -> String {
        if session.is_connected() {
            "\n● Connected\n".to_string()
        } else {
            "\n○ Disconnected\n".to_string()
        }
    }

    /// Format the roster panel
    ///
    /// # Arguments
    ///
    /// * `roster` - Currently online users
    /// * `own_id` - The local user's id (to mark as "me")
    pub fn format_roster(roster: &Roster, own_id: Option<i64>) -> String {
        let mut output = format!("Online Users ({})\n", roster.len());
        if roster.is_empty() {
            output.push_str("  (No one online)\n");
        }
        for user in roster.iter() {
            let initial = user
                .username
                .chars()
                .next()
                .map(|c| c.to_uppercase().to_string())
                .unwrap_or_else(|| "?".to_string());
            let me_suffix = if Some(user.id) == own_id { " (me)" } else { "" };
            output.push_str(&format!(
                "  [{}] {}{} - ID: {}\n",
                initial, user.username, me_suffix, user.id
            ));
        }
        output
    }

    /// Format one message of the log
    pub fn format_message(message: &Message, state: &ChatState) -> String {
        let time = format_local_time(message.timestamp);

        if message.is_system() {
            return format!("  -- {} --  {}\n", message.text, time);
        }

        let direct = if message.recipient_id.is_some() {
            " (direct)"
        } else {
            ""
        };

        if state.is_own(message) {
            return format!("  {:>5} you{}: {}\n", time, direct, message.text);
        }

        let sender = match (&message.username, message.sender_id) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(id)) => format!("User {}", id),
            _ => "Unknown".to_string(),
        };
        format!("  {:>5} @{}{}: {}\n", time, sender, direct, message.text)
    }

    /// Format the typing caption
    pub fn format_typing(indicator: &TypingIndicator) -> String {
        format!("  {} is typing...\n", indicator.username)
    }

    /// Format the whole screen for the current state
    pub fn format_screen(state: &ChatState) -> String {
        if !state.session.is_authenticated() {
            return Self::format_auth_gate();
        }

        let mut output = String::from("\n");
        output.push_str(&Self::format_header(&state.session));
        output.push_str(&Self::format_roster(state.roster(), state.session.user_id));
        output.push_str(&format!("{}\n", RULE));
        if state.messages().is_empty() {
            output.push_str("  (No messages yet)\n");
        }
        for message in state.messages() {
            output.push_str(&Self::format_message(message, state));
        }
        if let Some(indicator) = state.typing() {
            output.push_str(&Self::format_typing(indicator));
        }
        output
    }

    /// Format the compose prompt
    pub fn format_prompt(username: &str, recipient_id: Option<i64>) -> String {
        match recipient_id {
            Some(id) => format!("{} → {}> ", username, id),
            None => format!("{}> ", username),
        }
    }

    /// Format the command help
    pub fn format_help() -> String {
        [
            "Commands:",
            "  /to <id>  send direct messages to user <id>",
            "  /to       go back to broadcasting",
            "  /who      show who is online",
            "  /view     redraw the whole screen",
            "  /quit     leave the chat",
            "  /help     show this help",
            "",
        ]
        .join("\n")
    }

    /// Format a rejected action
    pub fn format_warning(message: &str) -> String {
        format!("\n! {}\n", message)
    }
}
