use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::fields;
use crate::crypto::FieldCipher;
use crate::error::{AppError, Result, msg};

/// Caller-managed lifecycle status. Never derived from `expiry_date`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
pub enum LicenseStatus {
    #[default]
    Active,
    Expired,
    Renewed,
}

/// How the `search` filter treats the license key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum KeySearch {
    /// Match against the decrypted key.
    #[default]
    Plaintext,
    /// Match against the stored ciphertext (legacy behavior).
    Ciphertext,
}

/// An uploaded file attached to a license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub file_name: String,
    pub storage_key: String,
    pub url: String,
    pub uploaded_at: i64,
}

/// A license as stored: the key is still encrypted.
#[derive(Debug, Clone)]
pub struct LicenseRecord {
    pub id: String,
    pub product_id: String,
    pub license_key_encrypted: String,
    pub expiry_date: i64,
    pub auto_renew: bool,
    pub usage_limits: Option<String>,
    pub status: LicenseStatus,
    pub notes: Option<String>,
    pub client_project: Option<String>,
    pub monthly_cost: f64,
    pub annual_cost: f64,
    pub documents: Vec<Document>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl LicenseRecord {
    pub fn decrypt(self, cipher: &FieldCipher) -> Result<License> {
        let license_key = cipher.decrypt(&self.license_key_encrypted)?;
        Ok(License {
            id: self.id,
            product_id: self.product_id,
            license_key,
            expiry_date: self.expiry_date,
            auto_renew: self.auto_renew,
            usage_limits: self.usage_limits,
            status: self.status,
            notes: self.notes,
            client_project: self.client_project,
            monthly_cost: self.monthly_cost,
            annual_cost: self.annual_cost,
            documents: self.documents,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A license as handed to its owner, with the key in plaintext.
#[derive(Debug, Clone, Serialize)]
pub struct License {
    pub id: String,
    pub product_id: String,
    pub license_key: String,
    pub expiry_date: i64,
    pub auto_renew: bool,
    pub usage_limits: Option<String>,
    pub status: LicenseStatus,
    pub notes: Option<String>,
    pub client_project: Option<String>,
    pub monthly_cost: f64,
    pub annual_cost: f64,
    pub documents: Vec<Document>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseWithProduct {
    #[serde(flatten)]
    pub license: License,
    pub product_name: String,
    pub product_tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLicense {
    pub product_id: String,
    pub license_key: String,
    #[serde(deserialize_with = "fields::timestamp")]
    pub expiry_date: i64,
    #[serde(default, deserialize_with = "fields::flexible_bool")]
    pub auto_renew: bool,
    #[serde(default)]
    pub usage_limits: Option<String>,
    #[serde(default)]
    pub status: LicenseStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub client_project: Option<String>,
    #[serde(default, deserialize_with = "fields::flexible_f64")]
    pub monthly_cost: f64,
    #[serde(default, deserialize_with = "fields::flexible_f64")]
    pub annual_cost: f64,
}

impl CreateLicense {
    pub fn validate(&self) -> Result<()> {
        if self.license_key.is_empty() {
            return Err(AppError::validation("license_key", msg::LICENSE_KEY_REQUIRED));
        }
        validate_cost("monthly_cost", self.monthly_cost)?;
        validate_cost("annual_cost", self.annual_cost)
    }
}

/// Partial update. Absent fields stay as they are; so do empty strings.
/// `auto_renew: false` is applied. Text fields typed `Option<Option<_>>`
/// are cleared by an explicit `null`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateLicense {
    #[serde(default)]
    pub license_key: Option<String>,
    #[serde(default, deserialize_with = "fields::optional_timestamp")]
    pub expiry_date: Option<i64>,
    #[serde(default, deserialize_with = "fields::optional_flexible_bool")]
    pub auto_renew: Option<bool>,
    #[serde(default, deserialize_with = "fields::optional_nullable")]
    pub usage_limits: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<LicenseStatus>,
    #[serde(default, deserialize_with = "fields::optional_nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "fields::optional_nullable")]
    pub client_project: Option<Option<String>>,
    #[serde(default, deserialize_with = "fields::optional_flexible_f64")]
    pub monthly_cost: Option<f64>,
    #[serde(default, deserialize_with = "fields::optional_flexible_f64")]
    pub annual_cost: Option<f64>,
}

impl UpdateLicense {
    pub fn validate(&self) -> Result<()> {
        if let Some(cost) = self.monthly_cost {
            validate_cost("monthly_cost", cost)?;
        }
        if let Some(cost) = self.annual_cost {
            validate_cost("annual_cost", cost)?;
        }
        Ok(())
    }

    /// Drop empty strings so they read as "not provided".
    pub fn normalized(mut self) -> Self {
        fn keep_text(field: Option<Option<String>>) -> Option<Option<String>> {
            match field {
                Some(Some(text)) if text.is_empty() => None,
                other => other,
            }
        }
        self.license_key = self.license_key.filter(|k| !k.is_empty());
        self.usage_limits = keep_text(self.usage_limits);
        self.notes = keep_text(self.notes);
        self.client_project = keep_text(self.client_project);
        self
    }
}

/// List filters. Empty query values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct LicenseFilter {
    #[serde(default, deserialize_with = "fields::non_empty")]
    pub status: Option<LicenseStatus>,
    #[serde(default, deserialize_with = "fields::non_empty")]
    pub client_project: Option<String>,
    #[serde(default, deserialize_with = "fields::non_empty")]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "fields::non_empty")]
    pub search: Option<String>,
}

fn validate_cost(field: &str, cost: f64) -> Result<()> {
    if !cost.is_finite() || cost < 0.0 {
        return Err(AppError::validation(field, "must be a non-negative number"));
    }
    Ok(())
}
