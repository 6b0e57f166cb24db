use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, AppResult};

pub mod platform;
pub mod review;
pub mod title;
pub mod user;

pub use platform::{NewPlatform, Platform};
pub use review::{NewReview, Rating, Review, ReviewFilter, ReviewPayload};
pub use title::{NewTitle, Title};
pub use user::{Actor, User};

/// Page-number pagination parameters, already clamped to the configured bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of results plus the neighbouring page numbers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub count: u64,
    pub page: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Builds a page from a slice of results and the total row count.
    ///
    /// Any page other than the first must contain at least one row.
    pub fn new(request: PageRequest, count: u64, results: Vec<T>) -> AppResult<Self> {
        if request.page > 1 && results.is_empty() {
            return Err(AppError::NotFound("Invalid page.".to_string()));
        }

        let seen = request.offset() + results.len() as u64;
        let next = (seen < count).then(|| request.page + 1);
        let previous = (request.page > 1).then(|| request.page - 1);

        Ok(Self {
            count,
            page: request.page,
            next,
            previous,
            results,
        })
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Deserializes a string with surrounding whitespace removed
pub(crate) fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

pub(crate) fn trimmed_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|s| s.map(|s| s.trim().to_string()))
}

/// Rejects `value` unless its character count lies within `min..=max`
pub(crate) fn check_length(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len < min {
        let message = if min == 1 {
            "This field may not be blank.".to_string()
        } else {
            format!("Ensure this field has at least {} characters.", min)
        };
        return Err(AppError::validation(field, message));
    }
    if len > max {
        return Err(AppError::validation(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        ));
    }
    Ok(())
}
