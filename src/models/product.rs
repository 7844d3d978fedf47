use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;
const TAG_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    /// User that created the product; never changes.
    pub owner_id: String,
    pub name: String,
    /// Insertion order is kept, but filtering treats tags as a set.
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Product {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateProduct {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_tags(&self.tags)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl UpdateProduct {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            validate_name(name)?;
        }
        if let Some(ref tags) = self.tags {
            validate_tags(tags)?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(AppError::validation("name", msg::NAME_LENGTH));
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<()> {
    if let Some(pos) = tags.iter().position(|t| t.chars().count() > TAG_MAX_CHARS) {
        return Err(AppError::validation(&format!("tags[{}]", pos), msg::TAG_TOO_LONG));
    }
    Ok(())
}
