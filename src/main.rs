//! filedock - Entry Point
//!
//! Serves a sandboxed directory tree over HTTP for browsing, upload,
//! download and deletion.

use log::{error, info};
use std::process;

use filedock::{Server, ServerConfig};

#[tokio::main]
async fn main() {
    // Default to info; RUST_LOG still takes precedence
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    info!("Launching filedock server...");
    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = server.start().await {
        error!("Server error: {}", e);
        process::exit(1);
    }
}
