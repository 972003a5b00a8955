//! Client configuration.
//!
//! The binaries fill this in from command-line arguments and environment
//! variables; the library only reads it.

use std::time::Duration;

use crate::error::ClientError;

/// Default base URL of the registration HTTP service
pub const DEFAULT_API_BASE: &str = "http://localhost:3000";

/// Default base URL of the realtime service
pub const DEFAULT_WS_BASE: &str = "http://localhost:3000";

/// Default Socket.IO endpoint path
pub const DEFAULT_SOCKET_PATH: &str = "/socket.io/";

/// Default timeout of one HTTP request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration of a chat client instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the HTTP collaborator (register, history)
    pub api_base: String,
    /// Base URL of the realtime collaborator
    pub ws_base: String,
    /// Socket.IO endpoint path on `ws_base`
    pub socket_path: String,
    /// Pull message history after connecting
    pub load_history: bool,
    /// Username to register with, skipping the interactive prompt
    pub username: Option<String>,
    /// Upper bound on each HTTP request, connect through body
    pub request_timeout: Duration,
    /// Skip the polling transport and open the WebSocket directly
    pub websocket_only: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ws_base: DEFAULT_WS_BASE.to_string(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            load_history: true,
            username: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            websocket_only: false,
        }
    }
}

impl ClientConfig {
    /// URL of the registration endpoint
    pub fn register_url(&self) -> String {
        format!("{}/api/auth/register", self.api_base.trim_end_matches('/'))
    }

    /// URL of the history endpoint
    pub fn history_url(&self) -> String {
        format!("{}/api/messages/pull", self.api_base.trim_end_matches('/'))
    }

    /// URL of the Socket.IO endpoint
    ///
    /// `ws`/`wss` bases are mapped to `http`/`https`; the transport picks
    /// the Engine.IO query itself.
    pub fn socket_url(&self) -> Result<String, ClientError> {
        let base = self.ws_base.trim_end_matches('/');
        let (scheme, rest) = base
            .split_once("://")
            .ok_or_else(|| ClientError::Connection(format!("invalid realtime URL '{}'", base)))?;

        let http_scheme = match scheme {
            "http" | "ws" => "http",
            "https" | "wss" => "https",
            other => {
                return Err(ClientError::Connection(format!(
                    "unsupported realtime URL scheme '{}'",
                    other
                )));
            }
        };

        Ok(format!(
            "{}://{}/{}/",
            http_scheme,
            rest,
            self.socket_path.trim_matches('/')
        ))
    }
}
