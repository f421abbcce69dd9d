use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::RwLock;

mod core;
mod store;
mod web;

use crate::core::config::Settings;
use crate::store::ScoreboardService;
use crate::web::server::start_web_server;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    info!("Starting scoreboard backend...");

    let settings = Settings::from_env();
    info!("Save data: {}", settings.ndjson_path.display());
    info!("Song catalog: {}", settings.songs_path.display());

    // Warm the cache; a missing data file is not fatal, the cache retries
    // on its next mtime check
    let mut service = ScoreboardService::new(&settings);
    if let Err(err) = service.warm_up() {
        warn!("Initial cache load failed: {}", err);
    }
    let service = Arc::new(RwLock::new(service));

    // Start the web interface
    let bind_addr = settings.bind_addr.clone();
    let server_handle = tokio::spawn(start_web_server(service.clone(), bind_addr));

    info!("Scoreboard backend is now running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");

    info!("Shutting down scoreboard backend...");
    if let Err(err) = server_handle.await {
        error!("Error during web server shutdown: {:?}", err);
    }

    info!("Scoreboard backend shutdown complete");
}
