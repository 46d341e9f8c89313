//! Presence relay - Entry Point
//!
//! Status updates over UDP on port P, chat over TCP on port P+1.

use log::{error, info};

use presence_relay::error::handlers::handle_error;
use presence_relay::{RelayConfig, Server};

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default filter
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match RelayConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Launching presence relay...");

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            handle_error(&e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run_until_ctrl_c().await {
        handle_error(&e);
        std::process::exit(1);
    }
}
