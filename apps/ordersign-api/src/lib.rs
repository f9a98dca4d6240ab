//! Order approval API
//!
//! Staff submit document orders; designated approvers sign them. Each
//! accepted signature is stamped into the order's PDF, the signed revision
//! is stored, and the order's status follows its signature count.

pub mod error;
pub mod handlers;
pub mod models;
pub mod orders;
pub mod signing;
pub mod state;
pub mod storage;

use axum::{
    routing::{delete, get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;

/// Build the application router. Middleware is layered on by the caller.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Profiles
        .route(
            "/api/profiles",
            post(handlers::create_profile).get(handlers::list_profiles),
        )
        // Orders
        .route(
            "/api/orders",
            post(handlers::create_order).get(handlers::list_orders),
        )
        .route("/api/orders/:id", delete(handlers::delete_order))
        .route("/api/orders/:id/signatures", post(handlers::sign_order))
        .route("/api/orders/:id/reject", post(handlers::reject_order))
        // Artifact delivery
        .route("/storage/documents/*key", get(handlers::get_artifact))
        .with_state(state)
}
