use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_length, trimmed_opt};
use crate::error::{AppError, AppResult};

/// A star rating, always within `Rating::MIN..=Rating::MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct Rating(i16);

impl Rating {
    pub const MIN: i16 = 1;
    pub const MAX: i16 = 5;

    pub fn value(self) -> i16 {
        self.0
    }
}

impl TryFrom<i16> for Rating {
    type Error = AppError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::validation(
                "rating",
                format!(
                    "Ensure this value is between {} and {}.",
                    Self::MIN,
                    Self::MAX
                ),
            ))
        }
    }
}

impl From<Rating> for i16 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's review of a title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub title_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewer_username: String,
    pub rating: Rating,
    pub description: Option<String>,
    pub active: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Review body as sent by clients.
///
/// Any reviewer or title fields in the body are ignored; both are bound from
/// the authenticated actor and the request path.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewPayload {
    pub rating: i16,
    #[serde(default, deserialize_with = "trimmed_opt")]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Validated review fields, used for both creation and full update
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub rating: Rating,
    pub description: Option<String>,
    pub active: bool,
}

impl ReviewPayload {
    pub fn validate(self) -> AppResult<NewReview> {
        let rating = Rating::try_from(self.rating)?;
        if let Some(description) = &self.description {
            check_length("description", description, 0, 200)?;
        }
        Ok(NewReview {
            rating,
            description: self.description,
            active: self.active,
        })
    }
}

/// Row filter for review listings; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewFilter {
    pub title_id: Option<Uuid>,
    pub reviewer_username: Option<String>,
    pub active: Option<bool>,
}

impl ReviewFilter {
    pub fn matches(&self, review: &Review) -> bool {
        self.title_id.map_or(true, |id| review.title_id == id)
            && self
                .reviewer_username
                .as_deref()
                .map_or(true, |name| review.reviewer_username == name)
            && self.active.map_or(true, |active| review.active == active)
    }
}

impl Review {
    pub fn new(title_id: Uuid, reviewer_id: Uuid, reviewer_username: String, input: NewReview) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title_id,
            reviewer_id,
            reviewer_username,
            rating: input.rating,
            description: input.description,
            active: input.active,
            created: now,
            updated: now,
        }
    }

    pub fn apply(&mut self, input: NewReview) {
        self.rating = input.rating;
        self.description = input.description;
        self.active = input.active;
        self.updated = Utc::now();
    }
}
