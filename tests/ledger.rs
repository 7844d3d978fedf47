//! License ledger tests: encryption at rest, ownership through the product,
//! filters, partial updates, documents and deletion.

mod common;
use common::*;

use licensetrack::error::AppError;
use licensetrack::storage::{BlobStore, StoredBlob};

/// Blob store whose disk is always full.
struct FullDisk;

impl BlobStore for FullDisk {
    fn store(&self, _upload: &Upload, _folder: &str) -> licensetrack::error::Result<StoredBlob> {
        Err(AppError::Storage(std::io::Error::other("disk full")))
    }
}

struct Fixture {
    conn: rusqlite::Connection,
    cipher: FieldCipher,
    blobs: MemoryBlobStore,
}

impl Fixture {
    fn new() -> Self {
        Self {
            conn: setup_test_db(),
            cipher: test_cipher(),
            blobs: MemoryBlobStore::new(),
        }
    }

    fn ledger(&self) -> Ledger<'_> {
        self.ledger_with(KeySearch::Plaintext)
    }

    fn ledger_with(&self, key_search: KeySearch) -> Ledger<'_> {
        Ledger::new(&self.conn, &self.cipher, &self.blobs, key_search)
    }
}

fn ids(licenses: &[LicenseWithProduct]) -> Vec<&str> {
    licenses.iter().map(|l| l.license.id.as_str()).collect()
}

// ============================================================================
// Create
// ============================================================================

#[test]
fn test_create_without_file() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &["Dev"]);

    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();

    assert!(created.license.id.starts_with("lt_lic_"));
    assert_eq!(created.license.license_key, "ABC123");
    assert!(created.license.documents.is_empty());
    assert_eq!(created.license.status, LicenseStatus::Active);
    assert_eq!(created.license.expiry_date, EXPIRY_2026_12_31);
    assert!(!created.license.auto_renew);
    assert_eq!(created.product_name, "Test Product");
    assert_eq!(created.product_tags, vec!["Dev"]);
    assert!(fx.blobs.is_empty());
}

#[test]
fn test_create_with_file_appends_one_document() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &["Dev"]);

    let created = fx
        .ledger()
        .create(
            "user-1",
            license_input(&product.id, "ABC123"),
            Some(pdf_upload("test.pdf")),
        )
        .unwrap();

    assert_eq!(created.license.license_key, "ABC123");
    assert_eq!(created.license.documents.len(), 1);
    let doc = &created.license.documents[0];
    assert_eq!(doc.file_name, "test.pdf");
    assert!(doc.storage_key.starts_with("licenses/"));
    assert_eq!(doc.url, format!("memory://{}", doc.storage_key));
    assert!(fx.blobs.get(&doc.storage_key).is_some());

    // Reloaded from the database too
    let fetched = fx.ledger().get("user-1", &created.license.id).unwrap();
    assert_eq!(fetched.license.documents, created.license.documents);
}

#[test]
fn test_key_is_encrypted_at_rest() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();

    let stored = queries::get_license_by_id(&fx.conn, &created.license.id)
        .unwrap()
        .unwrap();
    assert_ne!(stored.license_key_encrypted, "ABC123");
    assert!(!stored.license_key_encrypted.contains("ABC123"));
    assert_eq!(fx.cipher.decrypt(&stored.license_key_encrypted).unwrap(), "ABC123");
}

#[test]
fn test_create_requires_owned_product() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);

    let result = fx
        .ledger()
        .create("user-2", license_input(&product.id, "ABC123"), Some(pdf_upload("a.pdf")));
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let result = fx.ledger().create(
        "user-1",
        license_input("lt_prod_00000000000000000000000000000000", "ABC123"),
        None,
    );
    assert!(matches!(result, Err(AppError::NotFound(_))));

    assert!(fx.ledger().list("user-1", &LicenseFilter::default()).unwrap().is_empty());
    assert!(fx.blobs.is_empty(), "no upload for a rejected create");
}

#[test]
fn test_create_rejects_empty_key_and_negative_cost() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);

    let result = fx.ledger().create("user-1", license_input(&product.id, ""), None);
    assert!(matches!(result, Err(AppError::Validation(_))));

    let mut input = license_input(&product.id, "ABC123");
    input.monthly_cost = -5.0;
    let result = fx.ledger().create("user-1", input, None);
    assert!(matches!(result, Err(AppError::Validation(_))));
}

// ============================================================================
// Get / list
// ============================================================================

#[test]
fn test_get_hides_other_owners_licenses() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();

    let result = fx.ledger().get("user-2", &created.license.id);
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_list_is_scoped_to_owner() {
    let fx = Fixture::new();
    let mine = create_test_product(&fx.conn, "user-1", "Mine", &[]);
    let theirs = create_test_product(&fx.conn, "user-2", "Theirs", &[]);

    let a = fx
        .ledger()
        .create("user-1", license_input(&mine.id, "KEY-A"), None)
        .unwrap();
    fx.ledger()
        .create("user-2", license_input(&theirs.id, "KEY-B"), None)
        .unwrap();

    let listed = fx.ledger().list("user-1", &LicenseFilter::default()).unwrap();
    assert_eq!(ids(&listed), vec![a.license.id.as_str()]);
    assert_eq!(listed[0].license.license_key, "KEY-A");
}

#[test]
fn test_list_filters_by_status_and_client_project() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);

    let mut input = license_input(&product.id, "KEY-A");
    input.client_project = Some("Acme".to_string());
    let active = fx.ledger().create("user-1", input, None).unwrap();

    let mut input = license_input(&product.id, "KEY-B");
    input.status = LicenseStatus::Expired;
    input.client_project = Some("Acme".to_string());
    let expired = fx.ledger().create("user-1", input, None).unwrap();

    let mut input = license_input(&product.id, "KEY-C");
    input.client_project = Some("Globex".to_string());
    fx.ledger().create("user-1", input, None).unwrap();

    let filter = LicenseFilter {
        status: Some(LicenseStatus::Expired),
        ..Default::default()
    };
    let listed = fx.ledger().list("user-1", &filter).unwrap();
    assert_eq!(ids(&listed), vec![expired.license.id.as_str()]);

    let filter = LicenseFilter {
        client_project: Some("Acme".to_string()),
        ..Default::default()
    };
    let listed = fx.ledger().list("user-1", &filter).unwrap();
    assert_eq!(
        ids(&listed),
        vec![active.license.id.as_str(), expired.license.id.as_str()]
    );

    let filter = LicenseFilter {
        status: Some(LicenseStatus::Active),
        client_project: Some("Acme".to_string()),
        ..Default::default()
    };
    let listed = fx.ledger().list("user-1", &filter).unwrap();
    assert_eq!(ids(&listed), vec![active.license.id.as_str()]);
    assert!(listed.iter().all(|l| l.license.status == LicenseStatus::Active));
}

#[test]
fn test_list_filters_by_product_tag() {
    let fx = Fixture::new();
    let dev = create_test_product(&fx.conn, "user-1", "IDE", &["Dev", "Tools"]);
    let design = create_test_product(&fx.conn, "user-1", "Figma", &["Design"]);

    let a = fx
        .ledger()
        .create("user-1", license_input(&dev.id, "KEY-A"), None)
        .unwrap();
    fx.ledger()
        .create("user-1", license_input(&design.id, "KEY-B"), None)
        .unwrap();

    let filter = LicenseFilter {
        tag: Some("Dev".to_string()),
        ..Default::default()
    };
    let listed = fx.ledger().list("user-1", &filter).unwrap();
    assert_eq!(ids(&listed), vec![a.license.id.as_str()]);
    assert!(listed.iter().all(|l| l.product_tags.contains(&"Dev".to_string())));

    let filter = LicenseFilter {
        tag: Some("Marketing".to_string()),
        ..Default::default()
    };
    assert!(fx.ledger().list("user-1", &filter).unwrap().is_empty());
}

#[test]
fn test_search_matches_plaintext_key_and_notes() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);

    let by_key = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();
    let mut input = license_input(&product.id, "ZZZ999");
    input.notes = Some("Shared with the abc team".to_string());
    let by_notes = fx.ledger().create("user-1", input, None).unwrap();
    fx.ledger()
        .create("user-1", license_input(&product.id, "QQQ000"), None)
        .unwrap();

    let filter = LicenseFilter {
        search: Some("aBc".to_string()),
        ..Default::default()
    };
    let listed = fx.ledger().list("user-1", &filter).unwrap();
    assert_eq!(
        ids(&listed),
        vec![by_key.license.id.as_str(), by_notes.license.id.as_str()]
    );
}

#[test]
fn test_ciphertext_search_mode_matches_stored_form() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();
    let ledger = fx.ledger_with(KeySearch::Ciphertext);

    // The plaintext key is not searchable in this mode
    let filter = LicenseFilter {
        search: Some("ABC123".to_string()),
        ..Default::default()
    };
    assert!(ledger.list("user-1", &filter).unwrap().is_empty());

    let stored = queries::get_license_by_id(&fx.conn, &created.license.id)
        .unwrap()
        .unwrap();
    let fragment = stored.license_key_encrypted[8..20].to_string();
    let filter = LicenseFilter {
        search: Some(fragment),
        ..Default::default()
    };
    let listed = ledger.list("user-1", &filter).unwrap();
    assert_eq!(ids(&listed), vec![created.license.id.as_str()]);
    // Still handed back decrypted
    assert_eq!(listed[0].license.license_key, "ABC123");
}

#[test]
fn test_orphaned_licenses_drop_out_of_lists() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();

    registry::delete_product(&fx.conn, "user-1", &product.id).unwrap();

    assert!(fx.ledger().list("user-1", &LicenseFilter::default()).unwrap().is_empty());
    let result = fx.ledger().get("user-1", &created.license.id);
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// ============================================================================
// Update
// ============================================================================

#[test]
fn test_update_applies_provided_fields_only() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let mut input = license_input(&product.id, "ABC123");
    input.auto_renew = true;
    input.notes = Some("Original notes".to_string());
    input.usage_limits = Some("5 seats".to_string());
    input.monthly_cost = 10.0;
    let created = fx.ledger().create("user-1", input, None).unwrap();

    let updated = fx
        .ledger()
        .update(
            "user-1",
            &created.license.id,
            UpdateLicense {
                auto_renew: Some(false),
                status: Some(LicenseStatus::Renewed),
                notes: Some(None),
                usage_limits: Some(Some(String::new())),
                license_key: Some(String::new()),
                annual_cost: Some(120.0),
                ..Default::default()
            },
            None,
        )
        .unwrap();

    let license = &updated.license;
    assert!(!license.auto_renew, "explicit false must apply");
    assert_eq!(license.status, LicenseStatus::Renewed);
    assert_eq!(license.notes, None, "null clears");
    assert_eq!(license.usage_limits.as_deref(), Some("5 seats"), "empty keeps");
    assert_eq!(license.license_key, "ABC123", "empty key keeps");
    assert_eq!(license.monthly_cost, 10.0);
    assert_eq!(license.annual_cost, 120.0);
    assert_eq!(license.expiry_date, EXPIRY_2026_12_31);
    assert_eq!(license.product_id, product.id);
    assert!(license.updated_at >= created.license.updated_at);
}

#[test]
fn test_update_reencrypts_new_key() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();

    let updated = fx
        .ledger()
        .update(
            "user-1",
            &created.license.id,
            UpdateLicense {
                license_key: Some("NEW-KEY-456".to_string()),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(updated.license.license_key, "NEW-KEY-456");

    let stored = queries::get_license_by_id(&fx.conn, &created.license.id)
        .unwrap()
        .unwrap();
    assert!(!stored.license_key_encrypted.contains("NEW-KEY-456"));
    assert_eq!(fx.cipher.decrypt(&stored.license_key_encrypted).unwrap(), "NEW-KEY-456");
}

#[test]
fn test_update_appends_documents() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create(
            "user-1",
            license_input(&product.id, "ABC123"),
            Some(pdf_upload("invoice-2025.pdf")),
        )
        .unwrap();

    let updated = fx
        .ledger()
        .update(
            "user-1",
            &created.license.id,
            UpdateLicense::default(),
            Some(pdf_upload("invoice-2026.pdf")),
        )
        .unwrap();

    let names: Vec<&str> = updated
        .license
        .documents
        .iter()
        .map(|d| d.file_name.as_str())
        .collect();
    assert_eq!(names, vec!["invoice-2025.pdf", "invoice-2026.pdf"]);
    assert_eq!(fx.blobs.len(), 2);
}

#[test]
fn test_failed_upload_leaves_license_unchanged() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();

    let full = Ledger::new(&fx.conn, &fx.cipher, &FullDisk, KeySearch::Plaintext);
    let patch = UpdateLicense {
        license_key: Some("NEW-KEY".to_string()),
        notes: Some(Some("changed".to_string())),
        ..Default::default()
    };
    let result = full.update("user-1", &created.license.id, patch, Some(pdf_upload("a.pdf")));
    assert!(matches!(result, Err(AppError::Storage(_))));

    let current = fx.ledger().get("user-1", &created.license.id).unwrap();
    assert_eq!(current.license.license_key, "ABC123");
    assert_eq!(current.license.notes, created.license.notes);
    assert!(current.license.documents.is_empty());
}

#[test]
fn test_failed_upload_creates_nothing() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);

    let full = Ledger::new(&fx.conn, &fx.cipher, &FullDisk, KeySearch::Plaintext);
    let result = full.create(
        "user-1",
        license_input(&product.id, "ABC123"),
        Some(pdf_upload("a.pdf")),
    );
    assert!(matches!(result, Err(AppError::Storage(_))));

    let listed = fx.ledger().list("user-1", &LicenseFilter::default()).unwrap();
    assert!(listed.is_empty());
}

#[test]
fn test_update_ownership_errors() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();

    let patch = || UpdateLicense {
        notes: Some(Some("hijacked".to_string())),
        ..Default::default()
    };

    let result = fx.ledger().update("user-2", &created.license.id, patch(), None);
    assert!(matches!(result, Err(AppError::Unauthorized)));

    let result = fx.ledger().update(
        "user-1",
        "lt_lic_00000000000000000000000000000000",
        patch(),
        None,
    );
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let unchanged = fx.ledger().get("user-1", &created.license.id).unwrap();
    assert_eq!(unchanged.license.notes, None);

    // Orphaned: the product lookup fails, so the owner check fails closed
    registry::delete_product(&fx.conn, "user-1", &product.id).unwrap();
    let result = fx.ledger().update("user-1", &created.license.id, patch(), None);
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[test]
fn test_update_rejects_bad_cost() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();

    let result = fx.ledger().update(
        "user-1",
        &created.license.id,
        UpdateLicense {
            annual_cost: Some(f64::NAN),
            ..Default::default()
        },
        None,
    );
    assert!(matches!(result, Err(AppError::Validation(_))));
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn test_delete_removes_license() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create(
            "user-1",
            license_input(&product.id, "ABC123"),
            Some(pdf_upload("test.pdf")),
        )
        .unwrap();

    let deleted_id = fx.ledger().delete("user-1", &created.license.id).unwrap();
    assert_eq!(deleted_id, created.license.id);

    let result = fx.ledger().get("user-1", &created.license.id);
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(fx.ledger().list("user-1", &LicenseFilter::default()).unwrap().is_empty());
    assert!(
        queries::list_documents_for_license(&fx.conn, &created.license.id)
            .unwrap()
            .is_empty()
    );

    let again = fx.ledger().delete("user-1", &created.license.id);
    assert!(matches!(again, Err(AppError::NotFound(_))));
}

#[test]
fn test_delete_rejects_malformed_id() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    for id in [
        "not-an-id",
        "lt_lic_123",
        "lt_lic_zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz",
        product.id.as_str(),
    ] {
        let result = fx.ledger().delete("user-1", id);
        assert!(matches!(result, Err(AppError::BadRequest(_))), "id {}", id);
    }
}

#[test]
fn test_delete_by_other_owner_is_forbidden() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();

    let result = fx.ledger().delete("user-2", &created.license.id);
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let still_there = fx.ledger().get("user-1", &created.license.id).unwrap();
    assert_eq!(still_there.license.license_key, "ABC123");
}

#[test]
fn test_delete_orphan_is_not_found() {
    let fx = Fixture::new();
    let product = create_test_product(&fx.conn, "user-1", "Test Product", &[]);
    let created = fx
        .ledger()
        .create("user-1", license_input(&product.id, "ABC123"), None)
        .unwrap();
    registry::delete_product(&fx.conn, "user-1", &product.id).unwrap();

    let result = fx.ledger().delete("user-1", &created.license.id);
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
