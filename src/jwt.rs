//! Identity tokens.
//!
//! Requests carry an HS256 JWT whose `sub` claim is the user id. Tokens are
//! issued elsewhere; [`Authenticator::issue_token`] exists for seeding and
//! tests.

use jwt_simple::prelude::*;

use crate::error::{AppError, Result};

const ISSUER: &str = "licensetrack";

pub struct Authenticator {
    key: HS256Key,
    bypass_user_id: Option<String>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("bypass_user_id", &self.bypass_user_id)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: HS256Key::from_bytes(secret.as_bytes()),
            bypass_user_id: None,
        }
    }

    /// Act as this user on every request without checking tokens.
    /// Diagnostic mode only; the caller decides whether that applies.
    pub fn with_bypass_user(mut self, user_id: Option<String>) -> Self {
        self.bypass_user_id = user_id;
        self
    }

    pub fn bypass_user(&self) -> Option<&str> {
        self.bypass_user_id.as_deref()
    }

    pub fn issue_token(&self, user_id: &str, valid_for_days: u64) -> Result<String> {
        let claims = Claims::create(Duration::from_days(valid_for_days))
            .with_issuer(ISSUER)
            .with_subject(user_id);

        self.key
            .authenticate(claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify a token and return the user id it was issued for.
    pub fn verify(&self, token: &str) -> Result<String> {
        let options = VerificationOptions {
            allowed_issuers: Some(HashSet::from_strings(&[ISSUER])),
            ..Default::default()
        };

        let claims = self
            .key
            .verify_token::<NoCustomClaims>(token, Some(options))
            .map_err(|e| {
                tracing::debug!("Token verification failed: {}", e);
                AppError::Unauthorized
            })?;

        claims
            .subject
            .filter(|sub| !sub.is_empty())
            .ok_or(AppError::Unauthorized)
    }
}
