use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_length, trimmed};
use crate::error::{AppError, AppResult};

/// A streaming platform that hosts titles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Platform {
    pub id: Uuid,
    /// Display name (e.g., "Netflix")
    pub name: String,
    /// Short description of the platform
    pub about: String,
    pub website: String,
}

/// Writable platform fields, shared by create and full update
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NewPlatform {
    #[serde(deserialize_with = "trimmed")]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub about: String,
    #[serde(deserialize_with = "trimmed")]
    pub website: String,
}

impl NewPlatform {
    pub fn validate(&self) -> AppResult<()> {
        check_length("name", &self.name, 1, 30)?;
        check_length("about", &self.about, 0, 150)?;
        check_length("website", &self.website, 1, 100)?;

        let has_host = self
            .website
            .strip_prefix("https://")
            .or_else(|| self.website.strip_prefix("http://"))
            .is_some_and(|rest| !rest.is_empty());
        if !has_host {
            return Err(AppError::validation("website", "Enter a valid URL."));
        }

        Ok(())
    }
}

impl Platform {
    pub fn new(input: NewPlatform) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            about: input.about,
            website: input.website,
        }
    }
}
