// ABOUTME: Server binary: loads configuration, prepares the store, and serves the chat API
// ABOUTME: Zero-configuration startup against a local gateway; env vars override everything
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Parley Chat Server Binary
//!
//! Starts the chat server: configuration from the environment, SQLite schema
//! bootstrap, then the HTTP/WebSocket API.

use anyhow::Result;
use clap::Parser;
use parley_chat_server::{
    broadcast::ConversationBroadcaster, config::ServerConfig, database::Database,
    gateway::GatewayClient, logging, resources::ServerResources, server::ChatServer,
    session::SessionManager,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "parley-chat-server")]
#[command(about = "Parley - web chat back end proxying conversations to an external LLM gateway")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Parley chat server");
    info!("{}", config.summary());

    let database = Database::connect(&config.database.url).await?;
    database.migrate().await?;
    info!("Database initialized: {}", config.database.url);

    let gateway = GatewayClient::new(&config.gateway)?;
    info!("LLM gateway client ready: {}", config.gateway.base_url);

    let sessions = SessionManager::new(config.session.capacity);
    let broadcaster = ConversationBroadcaster::new();

    let http_port = config.http_port;
    let resources = Arc::new(ServerResources::new(
        database,
        gateway,
        sessions,
        broadcaster,
        config,
    ));

    display_available_endpoints(http_port);

    let server = ChatServer::new(resources);
    if let Err(e) = server.run(http_port).await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Display the API surface with its bound port
fn display_available_endpoints(port: u16) {
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());

    info!("=== Available API Endpoints ===");
    info!("Chat:");
    info!("   Current Conversation: GET    http://{host}:{port}/api/chat");
    info!("   Send Message:         POST   http://{host}:{port}/api/chat/messages");
    info!("   Clear History:        DELETE http://{host}:{port}/api/chat");
    info!("Live Updates:");
    info!("   Subscribe:            GET    ws://{host}:{port}/api/chat/ws?chat_id={{id}}");
    info!("Monitoring:");
    info!("   Health Check:         GET    http://{host}:{port}/health");
    info!("=== End of Endpoint List ===");
}
