use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::crypto::FieldCipher;
use crate::models::KeySearch;

/// HS256 signing refuses keys shorter than 96 bits.
const MIN_JWT_SECRET_BYTES: usize = 12;

/// Default request body limit for license uploads (10 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub base_url: String,
    /// Diagnostic mode: error details in responses, `--seed`, auth bypass.
    pub dev_mode: bool,
    pub field_cipher: FieldCipher,
    pub jwt_secret: String,
    /// Only honored in dev mode.
    pub auth_bypass_user_id: Option<String>,
    pub key_search: KeySearch,
}

impl Config {
    /// Load configuration from the environment (and `.env`, if present).
    ///
    /// Fails when a secret is missing or malformed; the server must not
    /// start without them.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("LICENSETRACK_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5000);

        let base_url = env::var("BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let field_key = non_empty_var("FIELD_ENCRYPTION_KEY")?;
        let field_cipher =
            FieldCipher::from_base64(&field_key).map_err(|e| ConfigError::Invalid {
                var: "FIELD_ENCRYPTION_KEY",
                reason: e.to_string(),
            })?;

        let jwt_secret = check_jwt_secret(non_empty_var("JWT_SECRET")?)?;

        let key_search = match env::var("LICENSE_SEARCH_MODE") {
            Ok(mode) => mode.parse().map_err(|_| ConfigError::Invalid {
                var: "LICENSE_SEARCH_MODE",
                reason: format!("expected 'plaintext' or 'ciphertext', got '{}'", mode),
            })?,
            Err(_) => KeySearch::default(),
        };

        Ok(Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "licensetrack.db".to_string()),
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".to_string())
                .into(),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            base_url,
            dev_mode,
            field_cipher,
            jwt_secret,
            auth_bypass_user_id: env::var("AUTH_BYPASS_USER_ID")
                .ok()
                .filter(|v| !v.is_empty()),
            key_search,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The bypass user, if diagnostic mode allows one.
    pub fn effective_bypass_user(&self) -> Option<String> {
        if self.dev_mode {
            self.auth_bypass_user_id.clone()
        } else {
            None
        }
    }
}

fn non_empty_var(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn check_jwt_secret(secret: String) -> Result<String, ConfigError> {
    if secret.len() < MIN_JWT_SECRET_BYTES {
        return Err(ConfigError::Invalid {
            var: "JWT_SECRET",
            reason: format!("must be at least {} bytes", MIN_JWT_SECRET_BYTES),
        });
    }
    Ok(secret)
}
