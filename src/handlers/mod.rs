mod costs;
mod licenses;
mod products;

pub use costs::*;
pub use licenses::*;
pub use products::*;

use axum::{
    Router, middleware,
    routing::{get, put},
};

use crate::db::AppState;
use crate::middleware::user_auth;

/// All `/api` routes. Every one of them requires an authenticated user.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Products
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/{id}", put(update_product).delete(delete_product))
        // Licenses
        .route("/api/licenses", get(list_licenses).post(create_license))
        .route(
            "/api/licenses/{id}",
            get(get_license).put(update_license).delete(delete_license),
        )
        // Summaries
        .route("/api/cost-summary", get(get_cost_summary))
        .route("/api/dashboard", get(get_dashboard))
        .layer(middleware::from_fn_with_state(state, user_auth))
}

pub async fn health() -> &'static str {
    "ok"
}
