//! ChatterX terminal chat client.
//!
//! Registers a username over HTTP, then chats over Socket.IO with presence
//! and typing indicators.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chatterx
//! cargo run --bin chatterx -- --username alice --api-base http://localhost:3000
//! ```

use std::time::Duration;

use clap::Parser;

use chatterx_client::{
    ClientConfig,
    config::{DEFAULT_API_BASE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SOCKET_PATH, DEFAULT_WS_BASE},
};
use chatterx_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "chatterx")]
#[command(about = "Terminal chat client with presence and typing indicators", long_about = None)]
struct Args {
    /// Base URL of the registration/history HTTP service
    #[arg(short = 'a', long, env = "CHATTERX_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Base URL of the realtime service
    #[arg(short = 'w', long, env = "CHATTERX_WS_BASE", default_value = DEFAULT_WS_BASE)]
    ws_base: String,

    /// Socket.IO endpoint path on the realtime service
    #[arg(long, env = "CHATTERX_SOCKET_PATH", default_value = DEFAULT_SOCKET_PATH)]
    socket_path: String,

    /// Register with this username instead of prompting for one
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Do not pull message history after connecting
    #[arg(long)]
    no_history: bool,

    /// Give up on an HTTP request after this many seconds
    #[arg(long, env = "CHATTERX_REQUEST_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    request_timeout: u64,

    /// Open the realtime WebSocket directly, without long-polling first
    #[arg(long, env = "CHATTERX_WEBSOCKET_ONLY")]
    websocket_only: bool,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        Self {
            api_base: args.api_base,
            ws_base: args.ws_base,
            socket_path: args.socket_path,
            load_history: !args.no_history,
            username: args.username,
            request_timeout: Duration::from_secs(args.request_timeout),
            websocket_only: args.websocket_only,
        }
    }
}

#[tokio::main]
async fn main() {
    // Log to stderr at warn so output does not fight the prompt
    setup_logger(env!("CARGO_BIN_NAME"), "warn");

    let args = Args::parse();

    if let Err(e) = chatterx_client::run_client(args.into()).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
