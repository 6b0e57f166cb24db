use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_length, trimmed};
use crate::error::{AppError, AppResult};

/// A movie or show listed on exactly one platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Title {
    pub id: Uuid,
    pub platform_id: Uuid,
    /// Name of the owning platform, denormalized for responses
    pub platform_name: String,
    pub name: String,
    pub storyline: String,
    pub active: bool,
    /// Derived from reviews; only review creation changes it
    pub average_rating: f64,
    /// Derived from reviews; only review creation changes it
    pub rating_count: i32,
    pub created: DateTime<Utc>,
}

/// Writable title fields. The rating aggregate is never client-supplied.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NewTitle {
    pub platform_id: Uuid,
    #[serde(deserialize_with = "trimmed")]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub storyline: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewTitle {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.chars().count() < 2 {
            return Err(AppError::validation(
                "name",
                "Name must be at least 2 characters long",
            ));
        }
        check_length("name", &self.name, 0, 50)?;
        check_length("storyline", &self.storyline, 0, 200)
    }
}

impl Title {
    /// Creates an unrated title
    pub fn new(input: NewTitle, platform_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            platform_id: input.platform_id,
            platform_name,
            name: input.name,
            storyline: input.storyline,
            active: input.active,
            average_rating: 0.0,
            rating_count: 0,
            created: Utc::now(),
        }
    }

    /// Overwrites the writable fields, leaving id, aggregate and creation time alone
    pub fn apply(&mut self, input: NewTitle, platform_name: String) {
        self.platform_id = input.platform_id;
        self.platform_name = platform_name;
        self.name = input.name;
        self.storyline = input.storyline;
        self.active = input.active;
    }
}
