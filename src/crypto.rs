//! Field-level encryption for sensitive license data.
//!
//! A single process-wide secret is stretched with HKDF into the AES-256-GCM
//! key that protects license keys at rest. Each encryption draws a fresh
//! nonce, so equal plaintexts produce different ciphertexts.
//!
//! Stored format (base64): MAGIC (4 bytes) || nonce (12 bytes) || ciphertext

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{AppError, Result};

/// Nonce size for AES-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Authentication tag appended by AES-GCM
const TAG_SIZE: usize = 16;

/// Secret size (256 bits for AES-256)
const SECRET_SIZE: usize = 32;

/// Magic bytes to identify encrypted data
const ENCRYPTED_MAGIC: &[u8] = b"LTK1";

/// HKDF info for the license key field
const LICENSE_KEY_INFO: &[u8] = b"license_key";

/// Encrypts and decrypts single string fields with a key derived from the
/// configured secret. Cheap to clone; holds no other state.
#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; SECRET_SIZE],
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}

impl FieldCipher {
    /// Create a cipher from a base64-encoded secret.
    /// The decoded secret must be exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::Internal(format!("Invalid field key encoding: {}", e)))?;

        let secret: [u8; SECRET_SIZE] = decoded.as_slice().try_into().map_err(|_| {
            AppError::Internal(format!(
                "Field key must be {} bytes, got {}",
                SECRET_SIZE,
                decoded.len()
            ))
        })?;

        Self::from_bytes(secret)
    }

    /// Create a cipher from raw secret bytes.
    pub fn from_bytes(secret: [u8; SECRET_SIZE]) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(Some(b"licensetrack-v1"), &secret);
        let mut key = [0u8; SECRET_SIZE];
        hk.expand(LICENSE_KEY_INFO, &mut key)
            .map_err(|e| AppError::Internal(format!("Key derivation failed: {}", e)))?;
        Ok(Self { key })
    }

    /// Generate a new random secret (for initial setup).
    /// Returns the secret as a base64-encoded string.
    pub fn generate_secret() -> String {
        use rand::RngCore;
        use rand::rngs::OsRng;
        let mut secret = [0u8; SECRET_SIZE];
        OsRng.fill_bytes(&mut secret);
        BASE64.encode(secret)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(format!("Failed to create cipher: {}", e)))
    }

    /// Encrypt a field value for storage.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        use rand::RngCore;
        use rand::rngs::OsRng;

        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Internal(format!("Encryption failed: {}", e)))?;

        let mut result = Vec::with_capacity(ENCRYPTED_MAGIC.len() + NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(ENCRYPTED_MAGIC);
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(result))
    }

    /// Decrypt a stored field value.
    pub fn decrypt(&self, stored: &str) -> Result<String> {
        let encrypted = BASE64
            .decode(stored)
            .map_err(|e| AppError::Internal(format!("Invalid encrypted field encoding: {}", e)))?;

        // Even an empty plaintext carries the 16-byte tag
        if encrypted.len() < ENCRYPTED_MAGIC.len() + NONCE_SIZE + TAG_SIZE {
            return Err(AppError::Internal("Encrypted data too short".into()));
        }

        let (magic, rest) = encrypted.split_at(ENCRYPTED_MAGIC.len());
        if magic != ENCRYPTED_MAGIC {
            return Err(AppError::Internal(
                "Invalid encrypted data format (missing magic bytes)".into(),
            ));
        }

        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher()?
            .decrypt(nonce, ciphertext)
            .map_err(|e| AppError::Internal(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Internal(format!("Decrypted field is not UTF-8: {}", e)))
    }
}
