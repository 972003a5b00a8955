//! Legacy mode: bare JSON chat frames over a raw WebSocket.
//!
//! No identity, roster, or typing; each entered line goes out as
//! `{"type":"chat","message":...}` and the `message` of each received frame is
//! printed.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::{
    error::ClientError,
    ui::{InputEvent, SharedPrompt, redisplay_prompt, spawn_line_editor},
};

/// Default endpoint of the legacy server
pub const DEFAULT_LEGACY_URL: &str = "ws://localhost:8080";

const LEGACY_PROMPT: &str = "> ";

/// Frame exchanged in legacy mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyFrame {
    #[serde(rename = "type", default = "chat_type")]
    pub kind: String,
    pub message: String,
}

fn chat_type() -> String {
    "chat".to_string()
}

impl LegacyFrame {
    pub fn chat(message: impl Into<String>) -> Self {
        Self {
            kind: chat_type(),
            message: message.into(),
        }
    }
}

/// Render one received text frame for display
pub fn format_frame(text: &str) -> String {
    match serde_json::from_str::<LegacyFrame>(text) {
        Ok(frame) => format!("\n{}\n", frame.message),
        Err(_) => format!("\n← Received: {}\n", text),
    }
}

/// Run a legacy session until the user leaves or the server goes away
pub async fn run_legacy_session(url: &str) -> Result<(), ClientError> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|e| ClientError::Connection(e.to_string()))?;

    tracing::info!("Connected to {}", url);
    println!("\nConnected. Type messages and press Enter to send. Press Ctrl+C to exit.\n");

    let (mut write, mut read) = ws_stream.split();
    let prompt: SharedPrompt = Arc::new(Mutex::new(LEGACY_PROMPT.to_string()));

    let prompt_for_read = prompt.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    print!("{}", format_frame(text.as_str()));
                    redisplay_prompt(&prompt_for_read);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    return false;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    return true;
                }
                _ => {}
            }
        }
        false
    });

    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    let _editor = spawn_line_editor(prompt, input_tx);

    let mut write_task = tokio::spawn(async move {
        while let Some(input) = input_rx.recv().await {
            let InputEvent::Line(line) = input else {
                continue;
            };
            if line.is_empty() {
                continue;
            }

            let json = match serde_json::to_string(&LegacyFrame::chat(line)) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                    continue;
                }
            };

            if let Err(e) = write.send(Message::Text(json.into())).await {
                tracing::warn!("Failed to send message: {}", e);
                return true;
            }
        }
        write.close().await.ok();
        false
    });

    // If any one of the tasks completes, abort the other
    let failed = tokio::select! {
        read_result = &mut read_task => {
            write_task.abort();
            read_result.unwrap_or(false)
        }
        write_result = &mut write_task => {
            read_task.abort();
            write_result.unwrap_or(false)
        }
    };

    if failed {
        return Err(ClientError::Connection("Connection lost".to_string()));
    }
    Ok(())
}
