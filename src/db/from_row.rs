//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Parse a JSON text column, converting parse errors to rusqlite errors.
fn parse_json<T: serde::de::DeserializeOwned>(row: &Row, col: usize) -> rusqlite::Result<T> {
    let text: String = row.get(col)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PRODUCT_COLS: &str = "id, owner_id, name, tags, created_at, updated_at";

/// Documents are loaded separately and attached after the row is read.
pub const LICENSE_COLS: &str = "id, product_id, license_key, expiry_date, auto_renew, usage_limits, status, notes, client_project, monthly_cost, annual_cost, created_at, updated_at";

pub const DOCUMENT_COLS: &str = "file_name, storage_key, url, uploaded_at";

// ============ FromRow Implementations ============

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            tags: parse_json(row, 3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for LicenseRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LicenseRecord {
            id: row.get(0)?,
            product_id: row.get(1)?,
            license_key_encrypted: row.get(2)?,
            expiry_date: row.get(3)?,
            auto_renew: row.get::<_, i32>(4)? != 0,
            usage_limits: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            notes: row.get(7)?,
            client_project: row.get(8)?,
            monthly_cost: row.get(9)?,
            annual_cost: row.get(10)?,
            documents: Vec::new(),
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl FromRow for Document {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Document {
            file_name: row.get(0)?,
            storage_key: row.get(1)?,
            url: row.get(2)?,
            uploaded_at: row.get(3)?,
        })
    }
}
