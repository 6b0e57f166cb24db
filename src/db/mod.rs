use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        NewPlatform, NewReview, NewTitle, PageRequest, Platform, Review, ReviewFilter, Title, User,
    },
};

pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};
pub use self::redis::{create_redis_client, RedisCounters};

/// Persistent catalog records.
///
/// Lookups of a missing row fail with `AppError::NotFound`. Writes that
/// reference a missing parent fail with a validation error on the offending
/// field.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync {
    async fn list_platforms(&self) -> AppResult<Vec<Platform>>;

    async fn get_platform(&self, id: Uuid) -> AppResult<Platform>;

    async fn insert_platform(&self, input: NewPlatform) -> AppResult<Platform>;

    async fn update_platform(&self, id: Uuid, input: NewPlatform) -> AppResult<Platform>;

    /// Deletes the platform together with its titles and their reviews
    async fn delete_platform(&self, id: Uuid) -> AppResult<()>;

    /// Returns one page of titles, oldest first, plus the total count
    async fn list_titles(&self, page: PageRequest) -> AppResult<(Vec<Title>, u64)>;

    async fn list_platform_titles(&self, platform_id: Uuid) -> AppResult<Vec<Title>>;

    async fn get_title(&self, id: Uuid) -> AppResult<Title>;

    async fn insert_title(&self, input: NewTitle) -> AppResult<Title>;

    /// Replaces the writable fields; the rating aggregate is left as is
    async fn update_title(&self, id: Uuid, input: NewTitle) -> AppResult<Title>;

    /// Deletes the title together with its reviews
    async fn delete_title(&self, id: Uuid) -> AppResult<()>;

    async fn list_reviews(&self, filter: ReviewFilter) -> AppResult<Vec<Review>>;

    async fn get_review(&self, id: Uuid) -> AppResult<Review>;

    /// Records `reviewer`'s review of a title.
    ///
    /// The uniqueness check, the title's aggregate update and the review insert
    /// commit together or not at all, serialized per title.
    async fn create_review(
        &self,
        title_id: Uuid,
        reviewer: User,
        input: NewReview,
    ) -> AppResult<(Review, Title)>;

    /// Replaces the writable fields; the title aggregate is not recomputed
    async fn update_review(&self, id: Uuid, input: NewReview) -> AppResult<Review>;

    async fn delete_review(&self, id: Uuid) -> AppResult<()>;
}

/// Resolves auth tokens to accounts
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns `None` when no account holds `token`
    async fn resolve_token(&self, token: &str) -> AppResult<Option<User>>;
}
