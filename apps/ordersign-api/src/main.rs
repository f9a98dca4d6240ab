//! Order approval API server
//!
//! Provides REST endpoints for:
//! - Order submission and aggregate loading
//! - Signing with PDF stamping
//! - Artifact delivery

use anyhow::Result;
use ordersign_api::state::{AppState, Config};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ordersign_api=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("initializing order approval API...");
    let config = Config::from_env();
    let state = Arc::new(AppState::new(&config).await?);

    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = ordersign_api::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("starting order approval API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
