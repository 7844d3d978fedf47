//! Test utilities and fixtures for LicenseTrack integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use licensetrack::crypto::FieldCipher;
pub use licensetrack::db::{AppState, DbPool, init_db, queries};
pub use licensetrack::jwt::Authenticator;
pub use licensetrack::ledger::Ledger;
pub use licensetrack::models::*;
pub use licensetrack::registry;
pub use licensetrack::storage::{MemoryBlobStore, Upload};

pub const TEST_JWT_SECRET: &str = "licensetrack-test-secret";

/// 2026-12-31T00:00:00Z
pub const EXPIRY_2026_12_31: i64 = 1_798_675_200;

/// Test cipher (deterministic key - ONLY for testing!)
pub fn test_cipher() -> FieldCipher {
    FieldCipher::from_bytes([0u8; 32]).expect("Failed to create test cipher")
}

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// In-memory pool; every connection sees the same database.
pub fn setup_test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(4).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }
    pool
}

pub fn test_state_with(blobs: Arc<MemoryBlobStore>, key_search: KeySearch) -> AppState {
    AppState {
        db: setup_test_pool(),
        cipher: test_cipher(),
        blobs,
        auth: Arc::new(Authenticator::new(TEST_JWT_SECRET)),
        key_search,
    }
}

pub fn test_state() -> AppState {
    test_state_with(Arc::new(MemoryBlobStore::new()), KeySearch::Plaintext)
}

pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    (licensetrack::app(state.clone()), state)
}

pub fn token_for(state: &AppState, user_id: &str) -> String {
    state.auth.issue_token(user_id, 1).unwrap()
}

/// Create a product with the given tags
pub fn create_test_product(conn: &Connection, owner_id: &str, name: &str, tags: &[&str]) -> Product {
    let input = CreateProduct {
        name: name.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    };
    registry::create_product(conn, owner_id, &input).expect("Failed to create test product")
}

/// License input with only the required fields set
pub fn license_input(product_id: &str, license_key: &str) -> CreateLicense {
    CreateLicense {
        product_id: product_id.to_string(),
        license_key: license_key.to_string(),
        expiry_date: EXPIRY_2026_12_31,
        auto_renew: false,
        usage_limits: None,
        status: LicenseStatus::Active,
        notes: None,
        client_project: None,
        monthly_cost: 0.0,
        annual_cost: 0.0,
    }
}

pub fn pdf_upload(file_name: &str) -> Upload {
    Upload {
        file_name: file_name.to_string(),
        content_type: Some("application/pdf".to_string()),
        bytes: Bytes::from_static(b"%PDF-1.4 dummy"),
    }
}

/// Build a JSON request with a bearer token
pub fn json_request(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a body-less request with a bearer token
pub fn get_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub const MULTIPART_BOUNDARY: &str = "----licensetrack-test-boundary";

/// Build a multipart body from text fields and an optional `(field, file name, bytes)` part
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                MULTIPART_BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((name, file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                MULTIPART_BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(method: &str, uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
