//! LicenseTrack - track software licenses, subscriptions and renewal costs
//!
//! Users register products, attach license records (encrypted keys, expiry,
//! costs, documents) to them, and read back cost and renewal summaries.

pub mod config;
pub mod costs;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod jwt;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod storage;

use axum::{Router, routing::get};

use crate::db::AppState;

/// The full application: health check plus the authenticated API.
/// Transport layers (tracing, body limits, static files) are added by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(handlers::router(state.clone()))
        .with_state(state)
}
