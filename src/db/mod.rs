mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::crypto::FieldCipher;
use crate::jwt::Authenticator;
use crate::models::KeySearch;
use crate::storage::BlobStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Encrypts license keys at rest
    pub cipher: FieldCipher,
    /// Where uploaded license documents go
    pub blobs: Arc<dyn BlobStore>,
    pub auth: Arc<Authenticator>,
    pub key_search: KeySearch,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
