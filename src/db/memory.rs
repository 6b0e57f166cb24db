use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EntityStore, IdentityProvider};
use crate::{
    error::{AppError, AppResult},
    models::{
        NewPlatform, NewReview, NewTitle, PageRequest, Platform, Review, ReviewFilter, Title, User,
    },
    services::reviews,
};

/// In-process store for tests and throwaway local runs.
///
/// Every mutation holds the single write lock, which makes each operation
/// serializable, including the combined review-creation step.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

/// Rows kept in insertion order
#[derive(Default)]
struct MemoryStoreInner {
    users: Vec<User>,
    tokens: HashMap<String, Uuid>,
    platforms: Vec<Platform>,
    titles: Vec<Title>,
    reviews: Vec<Review>,
}

impl MemoryStoreInner {
    fn platform(&self, id: Uuid) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id == id)
    }

    fn title_mut(&mut self, id: Uuid) -> AppResult<&mut Title> {
        self.titles
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| title_not_found(id))
    }

    fn platform_name(&self, id: Uuid) -> AppResult<String> {
        self.platform(id)
            .map(|p| p.name.clone())
            .ok_or_else(|| AppError::validation("platform_id", "Platform does not exist."))
    }
}

fn platform_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Platform {} not found", id))
}

fn title_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Title {} not found", id))
}

fn review_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Review {} not found", id))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account, standing in for the external identity provider
    pub async fn create_user(&self, username: &str, is_admin: bool) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            is_admin,
        };
        self.inner.write().await.users.push(user.clone());
        user
    }

    /// Issues a fresh token for `user_id`
    pub async fn issue_token(&self, user_id: Uuid) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.inner
            .write()
            .await
            .tokens
            .insert(token.clone(), user_id);
        token
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryStore {
    async fn resolve_token(&self, token: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        let user = inner
            .tokens
            .get(token)
            .and_then(|id| inner.users.iter().find(|u| u.id == *id))
            .cloned();
        Ok(user)
    }
}

#[async_trait::async_trait]
impl EntityStore for MemoryStore {
    async fn list_platforms(&self) -> AppResult<Vec<Platform>> {
        Ok(self.inner.read().await.platforms.clone())
    }

    async fn get_platform(&self, id: Uuid) -> AppResult<Platform> {
        self.inner
            .read()
            .await
            .platform(id)
            .cloned()
            .ok_or_else(|| platform_not_found(id))
    }

    async fn insert_platform(&self, input: NewPlatform) -> AppResult<Platform> {
        let platform = Platform::new(input);
        self.inner.write().await.platforms.push(platform.clone());
        Ok(platform)
    }

    async fn update_platform(&self, id: Uuid, input: NewPlatform) -> AppResult<Platform> {
        let mut inner = self.inner.write().await;
        let platform = inner
            .platforms
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| platform_not_found(id))?;

        platform.name = input.name;
        platform.about = input.about;
        platform.website = input.website;
        let platform = platform.clone();

        for title in inner.titles.iter_mut().filter(|t| t.platform_id == id) {
            title.platform_name = platform.name.clone();
        }

        Ok(platform)
    }

    async fn delete_platform(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let before = inner.platforms.len();
        inner.platforms.retain(|p| p.id != id);
        if inner.platforms.len() == before {
            return Err(platform_not_found(id));
        }

        let orphaned: Vec<Uuid> = inner
            .titles
            .iter()
            .filter(|t| t.platform_id == id)
            .map(|t| t.id)
            .collect();
        inner.titles.retain(|t| t.platform_id != id);
        inner.reviews.retain(|r| !orphaned.contains(&r.title_id));

        Ok(())
    }

    async fn list_titles(&self, page: PageRequest) -> AppResult<(Vec<Title>, u64)> {
        let inner = self.inner.read().await;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let results = inner
            .titles
            .iter()
            .skip(offset)
            .take(page.page_size as usize)
            .cloned()
            .collect();
        Ok((results, inner.titles.len() as u64))
    }

    async fn list_platform_titles(&self, platform_id: Uuid) -> AppResult<Vec<Title>> {
        Ok(self
            .inner
            .read()
            .await
            .titles
            .iter()
            .filter(|t| t.platform_id == platform_id)
            .cloned()
            .collect())
    }

    async fn get_title(&self, id: Uuid) -> AppResult<Title> {
        self.inner
            .read()
            .await
            .titles
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| title_not_found(id))
    }

    async fn insert_title(&self, input: NewTitle) -> AppResult<Title> {
        let mut inner = self.inner.write().await;
        let platform_name = inner.platform_name(input.platform_id)?;
        let title = Title::new(input, platform_name);
        inner.titles.push(title.clone());
        Ok(title)
    }

    async fn update_title(&self, id: Uuid, input: NewTitle) -> AppResult<Title> {
        let mut inner = self.inner.write().await;
        // existence of the title is reported before problems with the payload
        inner.title_mut(id)?;
        let platform_name = inner.platform_name(input.platform_id)?;

        let title = inner.title_mut(id)?;
        title.apply(input, platform_name);
        Ok(title.clone())
    }

    async fn delete_title(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let before = inner.titles.len();
        inner.titles.retain(|t| t.id != id);
        if inner.titles.len() == before {
            return Err(title_not_found(id));
        }
        inner.reviews.retain(|r| r.title_id != id);
        Ok(())
    }

    async fn list_reviews(&self, filter: ReviewFilter) -> AppResult<Vec<Review>> {
        Ok(self
            .inner
            .read()
            .await
            .reviews
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn get_review(&self, id: Uuid) -> AppResult<Review> {
        self.inner
            .read()
            .await
            .reviews
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| review_not_found(id))
    }

    async fn create_review(
        &self,
        title_id: Uuid,
        reviewer: User,
        input: NewReview,
    ) -> AppResult<(Review, Title)> {
        let mut inner = self.inner.write().await;

        let already_reviewed = inner
            .reviews
            .iter()
            .any(|r| r.title_id == title_id && r.reviewer_id == reviewer.id);

        // work on a copy so a rejected review leaves the stored title untouched
        let mut title = inner
            .titles
            .iter()
            .find(|t| t.id == title_id)
            .cloned()
            .ok_or_else(|| title_not_found(title_id))?;
        reviews::admit(&mut title, already_reviewed, input.rating)?;

        let review = Review::new(title_id, reviewer.id, reviewer.username, input);
        *inner.title_mut(title_id)? = title.clone();
        inner.reviews.push(review.clone());

        Ok((review, title))
    }

    async fn update_review(&self, id: Uuid, input: NewReview) -> AppResult<Review> {
        let mut inner = self.inner.write().await;
        let review = inner
            .reviews
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| review_not_found(id))?;
        review.apply(input);
        Ok(review.clone())
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let before = inner.reviews.len();
        inner.reviews.retain(|r| r.id != id);
        if inner.reviews.len() == before {
            return Err(review_not_found(id));
        }
        Ok(())
    }
}
