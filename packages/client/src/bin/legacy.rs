//! ChatterX legacy client: bare JSON chat frames over a raw WebSocket.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chatterx-legacy
//! cargo run --bin chatterx-legacy -- --url ws://127.0.0.1:8080
//! ```

use clap::Parser;

use chatterx_client::legacy::{DEFAULT_LEGACY_URL, run_legacy_session};
use chatterx_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "chatterx-legacy")]
#[command(about = "Raw WebSocket chat client (legacy mode)", long_about = None)]
struct Args {
    /// WebSocket server URL
    #[arg(short = 'u', long, env = "CHATTERX_LEGACY_URL", default_value = DEFAULT_LEGACY_URL)]
    url: String,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = run_legacy_session(&args.url).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
