// ABOUTME: Server binary for the health mentor backend
// ABOUTME: Loads environment configuration, wires resources, and serves the chat and nutrition API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![recursion_limit = "256"]

//! # Health Mentor Server Binary
//!
//! Starts the HTTP API for mentor chat sessions and food image analysis.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use health_mentor_server::{
    config::ServerConfig, constants::routes, logging, resources::ServerResources,
    server::MentorServer,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "health-mentor-server")]
#[command(about = "Health mentor backend - personalized LLM coaching for a fitness app")]
pub struct Args {
    /// Override listen host
    #[arg(long)]
    host: Option<String>,

    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    config.validate()?;
    info!("{}", config.summary());

    let host = config.host.clone();
    let port = config.http_port;
    let auth_enabled = config.firebase.auth_enabled;

    let resources = Arc::new(ServerResources::from_config(config)?);
    display_available_endpoints(&host, port, auth_enabled);

    if let Err(e) = MentorServer::new(resources).run(&host, port).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

/// Log the served endpoints
fn display_available_endpoints(host: &str, port: u16, auth_enabled: bool) {
    let base = format!("http://{host}:{port}");
    let guard = if auth_enabled { " (bearer token)" } else { "" };
    info!("=== Available API Endpoints ===");
    if auth_enabled {
        info!("  POST {base}{}{guard}", routes::SIGNUP);
        info!("  POST {base}{}{guard}", routes::LOGIN);
    }
    info!("  POST {base}{}{guard}", routes::CHAT);
    info!("  POST {base}{}{guard}", routes::CHAT_STREAM);
    info!("  GET  {base}{}{guard}", routes::CONVERSATION);
    info!("  POST {base}{}{guard}", routes::NUTRITION_ANALYZE);
    info!("  GET  {base}{}", routes::HEALTH);
    info!("  GET  {base}{}", routes::READY);
    info!("=== End of Endpoint List ===");
}
