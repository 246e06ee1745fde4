//! Favorites API server.
//!
//! Serves the favorites endpoints the sync engine's HTTP gateway talks to,
//! backed by memory, with CORS and security headers on every response.
//!
//! Usage:
//!   favorites-server --port 8080 --allow-origin http://localhost:3000
//!
//! State is lost on restart.

use anyhow::{Context, Result};
use clap::Parser;
use favorites_server::{CorsConfig, FavoritesStore, ServerConfig, build_router};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "favorites-server")]
#[command(about = "Favorites API server with CORS and security headers")]
struct Args {
    /// Port to listen on (HTTP)
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Origin allowed to make cross-origin requests (repeatable, `*` for any)
    #[arg(long = "allow-origin", default_value = "http://localhost:3000")]
    allow_origins: Vec<String>,

    /// Seconds browsers may cache a preflight response
    #[arg(long, default_value = "86400")]
    max_age: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            cors: CorsConfig {
                allowed_origins: self.allow_origins,
                max_age_secs: self.max_age,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = args.into_config();
    info!("Favorites server starting...");
    info!("Allowed origins: {:?}", config.cors.allowed_origins);

    let app = build_router(Arc::new(FavoritesStore::new()), config.cors);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", config.port))?;
    info!("HTTP API listening on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;
    Ok(())
}
