use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{Connection, ToSql, params, types::Value};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{DOCUMENT_COLS, LICENSE_COLS, PRODUCT_COLS, query_all, query_one};

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
        }
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Set a column to an explicit value (including NULL).
    /// Use this for Option<T> where Some(v) = set to v, None = set to NULL.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    /// Apply an `Option<Option<T>>` patch field: absent leaves the column alone.
    fn patch_nullable<V: Into<Value> + Clone>(
        self,
        column: &'static str,
        value: &Option<Option<V>>,
    ) -> Self {
        match value {
            Some(inner) => self.set_nullable(column, inner.clone()),
            None => self,
        }
    }

    /// Execute the update (always bumping `updated_at`) and report whether a row matched.
    fn execute(mut self, conn: &Connection) -> Result<bool> {
        self.fields.push(("updated_at", now().into()));
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

/// `?1, ?2, ...` placeholders for an IN clause, starting after `offset` params.
fn placeholders(count: usize, offset: usize) -> String {
    (offset + 1..=offset + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============ Products ============

pub fn create_product(conn: &Connection, owner_id: &str, input: &CreateProduct) -> Result<Product> {
    let id = EntityType::Product.gen_id();
    let now = now();
    let tags_json = serde_json::to_string(&input.tags)?;

    conn.execute(
        "INSERT INTO products (id, owner_id, name, tags, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&id, owner_id, &input.name, &tags_json, now],
    )?;

    Ok(Product {
        id,
        owner_id: owner_id.to_string(),
        name: input.name.clone(),
        tags: input.tags.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

pub fn get_product_for_owner(conn: &Connection, id: &str, owner_id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM products WHERE id = ?1 AND owner_id = ?2",
            PRODUCT_COLS
        ),
        &[&id, &owner_id],
    )
}

/// Products for an owner, oldest first.
pub fn list_products_for_owner(conn: &Connection, owner_id: &str) -> Result<Vec<Product>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM products WHERE owner_id = ?1 ORDER BY created_at, rowid",
            PRODUCT_COLS
        ),
        &[&owner_id],
    )
}

/// Apply the provided fields. Returns false if the product does not exist.
pub fn update_product(conn: &Connection, id: &str, input: &UpdateProduct) -> Result<bool> {
    let tags_json = input
        .tags
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    UpdateBuilder::new("products", id)
        .set_opt("name", input.name.clone())
        .set_opt("tags", tags_json)
        .execute(conn)
}

/// Delete an owner's product. Licenses referencing it are left in place.
pub fn delete_product(conn: &Connection, id: &str, owner_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM products WHERE id = ?1 AND owner_id = ?2",
        params![id, owner_id],
    )?;
    Ok(deleted > 0)
}

// ============ Licenses ============

/// Insert a license whose key has already been encrypted.
pub fn create_license(
    conn: &Connection,
    input: &CreateLicense,
    license_key_encrypted: &str,
) -> Result<LicenseRecord> {
    let id = EntityType::License.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO licenses (id, product_id, license_key, expiry_date, auto_renew, usage_limits, status, notes, client_project, monthly_cost, annual_cost, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            &id,
            &input.product_id,
            license_key_encrypted,
            input.expiry_date,
            input.auto_renew,
            &input.usage_limits,
            input.status.as_ref(),
            &input.notes,
            &input.client_project,
            input.monthly_cost,
            input.annual_cost,
            now
        ],
    )?;

    Ok(LicenseRecord {
        id,
        product_id: input.product_id.clone(),
        license_key_encrypted: license_key_encrypted.to_string(),
        expiry_date: input.expiry_date,
        auto_renew: input.auto_renew,
        usage_limits: input.usage_limits.clone(),
        status: input.status,
        notes: input.notes.clone(),
        client_project: input.client_project.clone(),
        monthly_cost: input.monthly_cost,
        annual_cost: input.annual_cost,
        documents: Vec::new(),
        created_at: now,
        updated_at: now,
    })
}

/// Fetch a license with its documents.
pub fn get_license_by_id(conn: &Connection, id: &str) -> Result<Option<LicenseRecord>> {
    let license: Option<LicenseRecord> = query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE id = ?1", LICENSE_COLS),
        &[&id],
    )?;

    license
        .map(|mut license| {
            license.documents = list_documents_for_license(conn, &license.id)?;
            Ok(license)
        })
        .transpose()
}

/// Licenses referencing any of `product_ids`, with exact-match status and
/// client project filters applied in SQL. Documents are attached.
pub fn list_licenses_for_products(
    conn: &Connection,
    product_ids: &[&str],
    status: Option<LicenseStatus>,
    client_project: Option<&str>,
) -> Result<Vec<LicenseRecord>> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut params: Vec<&dyn ToSql> = product_ids.iter().map(|id| id as &dyn ToSql).collect();
    let mut sql = format!(
        "SELECT {} FROM licenses WHERE product_id IN ({})",
        LICENSE_COLS,
        placeholders(product_ids.len(), 0)
    );

    let status_str = status.map(|s| s.as_ref().to_string());
    if let Some(ref status) = status_str {
        params.push(status);
        sql.push_str(&format!(" AND status = ?{}", params.len()));
    }
    if let Some(ref client_project) = client_project {
        params.push(client_project);
        sql.push_str(&format!(" AND client_project = ?{}", params.len()));
    }
    sql.push_str(" ORDER BY created_at, rowid");

    let mut licenses: Vec<LicenseRecord> = query_all(conn, &sql, &params)?;

    let ids: Vec<&str> = licenses.iter().map(|l| l.id.as_str()).collect();
    let mut documents = list_documents_for_licenses(conn, &ids)?;
    for license in &mut licenses {
        if let Some(docs) = documents.remove(&license.id) {
            license.documents = docs;
        }
    }

    Ok(licenses)
}

/// Apply a normalized patch. `license_key_encrypted` replaces the stored key when given.
pub fn update_license(
    conn: &Connection,
    id: &str,
    input: &UpdateLicense,
    license_key_encrypted: Option<&str>,
) -> Result<bool> {
    UpdateBuilder::new("licenses", id)
        .set_opt("license_key", license_key_encrypted.map(str::to_string))
        .set_opt("expiry_date", input.expiry_date)
        .set_opt("auto_renew", input.auto_renew)
        .patch_nullable("usage_limits", &input.usage_limits)
        .set_opt("status", input.status.map(|s| s.as_ref().to_string()))
        .patch_nullable("notes", &input.notes)
        .patch_nullable("client_project", &input.client_project)
        .set_opt("monthly_cost", input.monthly_cost)
        .set_opt("annual_cost", input.annual_cost)
        .execute(conn)
}

/// Permanently delete a license and its document records.
pub fn delete_license(conn: &Connection, id: &str) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM license_documents WHERE license_id = ?1",
        params![id],
    )?;
    let deleted = tx.execute("DELETE FROM licenses WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

// ============ License documents ============

pub fn add_license_document(conn: &Connection, license_id: &str, document: &Document) -> Result<()> {
    conn.execute(
        "INSERT INTO license_documents (license_id, file_name, storage_key, url, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            license_id,
            &document.file_name,
            &document.storage_key,
            &document.url,
            document.uploaded_at
        ],
    )?;
    Ok(())
}

pub fn list_documents_for_license(conn: &Connection, license_id: &str) -> Result<Vec<Document>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM license_documents WHERE license_id = ?1 ORDER BY uploaded_at, seq",
            DOCUMENT_COLS
        ),
        &[&license_id],
    )
}

/// Batch fetch documents, grouped by license id.
fn list_documents_for_licenses(
    conn: &Connection,
    license_ids: &[&str],
) -> Result<HashMap<String, Vec<Document>>> {
    let mut grouped: HashMap<String, Vec<Document>> = HashMap::new();
    if license_ids.is_empty() {
        return Ok(grouped);
    }

    let sql = format!(
        "SELECT license_id, {} FROM license_documents WHERE license_id IN ({}) ORDER BY uploaded_at, seq",
        DOCUMENT_COLS,
        placeholders(license_ids.len(), 0)
    );
    let params: Vec<&dyn ToSql> = license_ids.iter().map(|id| id as &dyn ToSql).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params.as_slice(), |row| {
        Ok((
            row.get::<_, String>(0)?,
            Document {
                file_name: row.get(1)?,
                storage_key: row.get(2)?,
                url: row.get(3)?,
                uploaded_at: row.get(4)?,
            },
        ))
    })?;

    for row in rows {
        let (license_id, document) = row?;
        grouped.entry(license_id).or_default().push(document);
    }

    Ok(grouped)
}
