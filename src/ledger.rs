//! License ledger.
//!
//! Licenses belong to a user through their product: every operation resolves
//! the product and compares its owner with the caller. License keys are
//! encrypted before they reach the database and decrypted before they leave
//! this module.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::Connection;

use crate::crypto::FieldCipher;
use crate::db::queries;
use crate::error::{AppError, OptionExt, Result, msg};
use crate::id::{EntityType, is_valid_id_for};
use crate::models::{
    CreateLicense, Document, KeySearch, LicenseFilter, LicenseRecord, LicenseWithProduct, Product,
    UpdateLicense,
};
use crate::storage::{BlobStore, LICENSE_FOLDER, Upload};

pub struct Ledger<'a> {
    conn: &'a Connection,
    cipher: &'a FieldCipher,
    blobs: &'a dyn BlobStore,
    key_search: KeySearch,
}

impl<'a> Ledger<'a> {
    pub fn new(
        conn: &'a Connection,
        cipher: &'a FieldCipher,
        blobs: &'a dyn BlobStore,
        key_search: KeySearch,
    ) -> Self {
        Self {
            conn,
            cipher,
            blobs,
            key_search,
        }
    }

    pub fn create(
        &self,
        owner_id: &str,
        input: CreateLicense,
        file: Option<Upload>,
    ) -> Result<LicenseWithProduct> {
        input.validate()?;

        let product = queries::get_product_for_owner(self.conn, &input.product_id, owner_id)?
            .or_not_found(msg::PRODUCT_NOT_FOUND)?;

        // Upload first: a failed insert afterwards leaves an unreferenced blob
        let document = file.map(|upload| self.store_document(&upload)).transpose()?;

        let encrypted = self.cipher.encrypt(&input.license_key)?;

        let tx = self.conn.unchecked_transaction()?;
        let mut record = queries::create_license(&tx, &input, &encrypted)?;
        if let Some(document) = document {
            queries::add_license_document(&tx, &record.id, &document)?;
            record.documents.push(document);
        }
        tx.commit()?;

        tracing::info!(
            license_id = %record.id,
            product_id = %product.id,
            documents = record.documents.len(),
            "Created license"
        );

        self.with_product(record, &product)
    }

    /// Look up one of the caller's licenses. Other owners' and orphaned
    /// licenses read as missing.
    pub fn get(&self, owner_id: &str, id: &str) -> Result<LicenseWithProduct> {
        let record =
            queries::get_license_by_id(self.conn, id)?.or_not_found(msg::LICENSE_NOT_FOUND)?;

        let product = queries::get_product_by_id(self.conn, &record.product_id)?
            .filter(|p| p.owner_id == owner_id)
            .or_not_found(msg::LICENSE_NOT_FOUND)?;

        self.with_product(record, &product)
    }

    /// All of the caller's licenses matching `filter`.
    ///
    /// `status` and `client_project` are matched in the query; `search` and
    /// `tag` are applied afterwards.
    pub fn list(&self, owner_id: &str, filter: &LicenseFilter) -> Result<Vec<LicenseWithProduct>> {
        let products: HashMap<String, Product> =
            queries::list_products_for_owner(self.conn, owner_id)?
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect();
        let product_ids: Vec<&str> = products.keys().map(String::as_str).collect();

        let records = queries::list_licenses_for_products(
            self.conn,
            &product_ids,
            filter.status,
            filter.client_project.as_deref(),
        )?;

        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut licenses = Vec::with_capacity(records.len());

        for record in records {
            let Some(product) = products.get(&record.product_id) else {
                continue;
            };
            if let Some(ref tag) = filter.tag
                && !product.has_tag(tag)
            {
                continue;
            }

            // The stored form is only available before decryption
            let ciphertext_hit = match (&needle, self.key_search) {
                (Some(n), KeySearch::Ciphertext) => {
                    contains_ignore_case(&record.license_key_encrypted, n)
                }
                _ => false,
            };

            let license = self.with_product(record, product)?;

            if let Some(ref needle) = needle {
                let notes_hit = license
                    .license
                    .notes
                    .as_deref()
                    .is_some_and(|notes| contains_ignore_case(notes, needle));
                let key_hit = ciphertext_hit
                    || (self.key_search == KeySearch::Plaintext
                        && contains_ignore_case(&license.license.license_key, needle));
                if !notes_hit && !key_hit {
                    continue;
                }
            }

            licenses.push(license);
        }

        Ok(licenses)
    }

    /// Apply a partial update, re-encrypting the key when one is given and
    /// appending `file` to the documents.
    pub fn update(
        &self,
        owner_id: &str,
        id: &str,
        input: UpdateLicense,
        file: Option<Upload>,
    ) -> Result<LicenseWithProduct> {
        let input = input.normalized();
        input.validate()?;

        let existing =
            queries::get_license_by_id(self.conn, id)?.or_not_found(msg::LICENSE_NOT_FOUND)?;

        let owned = queries::get_product_by_id(self.conn, &existing.product_id)?
            .is_some_and(|p| p.owner_id == owner_id);
        if !owned {
            tracing::debug!(license_id = id, owner_id, "{}", msg::NOT_LICENSE_OWNER);
            return Err(AppError::Unauthorized);
        }

        let encrypted = input
            .license_key
            .as_deref()
            .map(|key| self.cipher.encrypt(key))
            .transpose()?;

        let document = file.map(|upload| self.store_document(&upload)).transpose()?;

        let tx = self.conn.unchecked_transaction()?;
        queries::update_license(&tx, id, &input, encrypted.as_deref())?;
        if let Some(document) = document {
            queries::add_license_document(&tx, id, &document)?;
        }
        tx.commit()?;

        self.get(owner_id, id)
    }

    /// Permanently remove a license and its document records.
    pub fn delete(&self, owner_id: &str, id: &str) -> Result<String> {
        if !is_valid_id_for(EntityType::License, id) {
            return Err(AppError::BadRequest(msg::INVALID_LICENSE_ID.into()));
        }

        let existing =
            queries::get_license_by_id(self.conn, id)?.or_not_found(msg::LICENSE_NOT_FOUND)?;
        let product = queries::get_product_by_id(self.conn, &existing.product_id)?
            .or_not_found(msg::PRODUCT_NOT_FOUND)?;

        if product.owner_id != owner_id {
            return Err(AppError::Forbidden(msg::NOT_LICENSE_OWNER_DELETE.into()));
        }

        queries::delete_license(self.conn, id)?;
        tracing::info!(license_id = id, owner_id, "Deleted license");
        Ok(existing.id)
    }

    fn store_document(&self, upload: &Upload) -> Result<Document> {
        let blob = self.blobs.store(upload, LICENSE_FOLDER)?;
        Ok(Document {
            file_name: blob.file_name,
            storage_key: blob.storage_key,
            url: blob.url,
            uploaded_at: Utc::now().timestamp(),
        })
    }

    fn with_product(&self, record: LicenseRecord, product: &Product) -> Result<LicenseWithProduct> {
        Ok(LicenseWithProduct {
            license: record.decrypt(self.cipher)?,
            product_name: product.name.clone(),
            product_tags: product.tags.clone(),
        })
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}
