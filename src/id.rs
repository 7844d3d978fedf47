//! Prefixed ID generation for tracked entities.
//!
//! Format: `lt_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// Validate an ID for a specific entity type: `{prefix}_{32_hex_chars}`.
///
/// A cheap check to reject garbage before hitting the database.
pub fn is_valid_id_for(entity: EntityType, s: &str) -> bool {
    s.strip_prefix(entity.prefix())
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|hex| hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Product,
    License,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Product => "lt_prod",
            Self::License => "lt_lic",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
