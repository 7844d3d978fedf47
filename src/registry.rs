//! Product registry: products are visible and mutable only by their owner.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::{CreateProduct, Product, UpdateProduct};

pub fn create_product(conn: &Connection, owner_id: &str, input: &CreateProduct) -> Result<Product> {
    input.validate()?;
    let product = queries::create_product(conn, owner_id, input)?;
    tracing::info!(product_id = %product.id, owner_id, "Created product");
    Ok(product)
}

pub fn list_products(conn: &Connection, owner_id: &str) -> Result<Vec<Product>> {
    queries::list_products_for_owner(conn, owner_id)
}

/// Apply only the provided fields. Another owner's product reads as missing.
pub fn update_product(
    conn: &Connection,
    owner_id: &str,
    id: &str,
    input: &UpdateProduct,
) -> Result<Product> {
    input.validate()?;

    queries::get_product_for_owner(conn, id, owner_id)?.or_not_found(msg::PRODUCT_NOT_FOUND)?;
    queries::update_product(conn, id, input)?;

    queries::get_product_for_owner(conn, id, owner_id)?.or_not_found(msg::PRODUCT_NOT_FOUND)
}

/// Remove the product. Its licenses stay behind as orphans.
pub fn delete_product(conn: &Connection, owner_id: &str, id: &str) -> Result<()> {
    if !queries::delete_product(conn, id, owner_id)? {
        return Err(AppError::NotFound(msg::PRODUCT_NOT_FOUND.into()));
    }
    tracing::info!(product_id = id, owner_id, "Deleted product");
    Ok(())
}
