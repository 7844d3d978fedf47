//! Blob storage for license documents.
//!
//! The ledger only needs "put these bytes somewhere and give me a key and a
//! URL", so storage sits behind the [`BlobStore`] trait.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use axum::body::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Folder that license documents are stored under.
pub const LICENSE_FOLDER: &str = "licenses";

/// A file received with a request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Where a stored file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub storage_key: String,
    pub url: String,
    pub file_name: String,
}

pub trait BlobStore: Send + Sync {
    fn store(&self, upload: &Upload, folder: &str) -> Result<StoredBlob>;
}

/// Keep only the final path component and characters that are safe in a key.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Build a unique storage key: `{folder}/{millis}-{rand}-{name}`.
fn storage_key(folder: &str, file_name: &str) -> String {
    let rand = Uuid::new_v4().as_simple().to_string();
    format!(
        "{}/{}-{}-{}",
        folder.trim_matches('/'),
        Utc::now().timestamp_millis(),
        &rand[..8],
        sanitize_file_name(file_name)
    )
}

/// Stores files on the local filesystem; they are served back under `/files`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    /// `public_base` is the URL prefix the files are served from,
    /// e.g. `http://localhost:5000/files`.
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for LocalBlobStore {
    fn store(&self, upload: &Upload, folder: &str) -> Result<StoredBlob> {
        let key = storage_key(folder, &upload.file_name);
        let path = self.root.join(&key);
        let parent = path
            .parent()
            .ok_or_else(|| AppError::Internal(format!("Invalid storage path for {}", key)))?;
        std::fs::create_dir_all(parent)?;
        std::fs::write(&path, &upload.bytes)?;

        tracing::debug!(
            "Stored {} ({} bytes, {:?}) at {}",
            upload.file_name,
            upload.bytes.len(),
            upload.content_type,
            path.display()
        );

        Ok(StoredBlob {
            url: format!("{}/{}", self.public_base, key),
            storage_key: key,
            file_name: upload.file_name.clone(),
        })
    }
}

/// Keeps files in memory. Used by tests and throwaway setups.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, storage_key: &str) -> Option<Bytes> {
        self.blobs
            .lock()
            .ok()
            .and_then(|blobs| blobs.get(storage_key).cloned())
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn store(&self, upload: &Upload, folder: &str) -> Result<StoredBlob> {
        let key = storage_key(folder, &upload.file_name);
        self.blobs
            .lock()
            .map_err(|_| AppError::Internal("Blob store lock poisoned".into()))?
            .insert(key.clone(), upload.bytes.clone());
        Ok(StoredBlob {
            url: format!("memory://{}", key),
            storage_key: key,
            file_name: upload.file_name.clone(),
        })
    }
}
