use axum::{
    extract::{Extension, State},
    http::StatusCode,
};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::middleware::UserContext;
use crate::models::{CreateProduct, Product, UpdateProduct};
use crate::registry;

pub async fn create_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Json(input): Json<CreateProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let conn = state.db.get()?;
    let product = registry::create_product(&conn, &ctx.user_id, &input)?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_products(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Json<Vec<Product>>> {
    let conn = state.db.get()?;
    Ok(Json(registry::list_products(&conn, &ctx.user_id)?))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
    Json(input): Json<UpdateProduct>,
) -> Result<Json<Product>> {
    let conn = state.db.get()?;
    let product = registry::update_product(&conn, &ctx.user_id, &id, &input)?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    registry::delete_product(&conn, &ctx.user_id, &id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}
