use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use super::{EntityStore, IdentityProvider};
use crate::{
    error::{AppError, AppResult},
    models::{
        NewPlatform, NewReview, NewTitle, PageRequest, Platform, Rating, Review, ReviewFilter,
        Title, User,
    },
    services::reviews,
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const TITLE_SELECT: &str = "SELECT t.id, t.platform_id, p.name AS platform_name, t.name, \
     t.storyline, t.active, t.average_rating, t.rating_count, t.created \
     FROM titles t JOIN platforms p ON p.id = t.platform_id";

const REVIEW_SELECT: &str = "SELECT r.id, r.title_id, r.reviewer_id, u.username AS reviewer_username, \
     r.rating, r.description, r.active, r.created, r.updated \
     FROM reviews r JOIN users u ON u.id = r.reviewer_id";

#[derive(sqlx::FromRow)]
struct PlatformRow {
    id: Uuid,
    name: String,
    about: String,
    website: String,
}

impl From<PlatformRow> for Platform {
    fn from(row: PlatformRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            about: row.about,
            website: row.website,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TitleRow {
    id: Uuid,
    platform_id: Uuid,
    platform_name: String,
    name: String,
    storyline: String,
    active: bool,
    average_rating: f64,
    rating_count: i32,
    created: DateTime<Utc>,
}

impl From<TitleRow> for Title {
    fn from(row: TitleRow) -> Self {
        Self {
            id: row.id,
            platform_id: row.platform_id,
            platform_name: row.platform_name,
            name: row.name,
            storyline: row.storyline,
            active: row.active,
            average_rating: row.average_rating,
            rating_count: row.rating_count,
            created: row.created,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    title_id: Uuid,
    reviewer_id: Uuid,
    reviewer_username: String,
    rating: i16,
    description: Option<String>,
    active: bool,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = AppError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::try_from(row.rating).map_err(|_| {
            AppError::Internal(format!("Review {} has stored rating {}", row.id, row.rating))
        })?;

        Ok(Self {
            id: row.id,
            title_id: row.title_id,
            reviewer_id: row.reviewer_id,
            reviewer_username: row.reviewer_username,
            rating,
            description: row.description,
            active: row.active,
            created: row.created,
            updated: row.updated,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    is_admin: bool,
}

/// Names the client field behind a foreign-key violation
fn foreign_key_error(constraint: Option<&str>) -> Option<AppError> {
    match constraint? {
        "titles_platform_id_fkey" => Some(AppError::validation(
            "platform_id",
            "Platform does not exist.",
        )),
        "reviews_reviewer_id_fkey" => Some(AppError::validation(
            "reviewer",
            "Reviewer does not exist.",
        )),
        "reviews_title_id_fkey" => Some(AppError::NotFound("Title not found".to_string())),
        _ => None,
    }
}

/// Translates constraint violations into validation failures
fn map_write_error(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_foreign_key_violation() {
            if let Some(mapped) = foreign_key_error(db_err.constraint()) {
                return mapped;
            }
        }
        if db_err.is_unique_violation()
            && db_err.constraint() == Some("reviews_title_reviewer_key")
        {
            return reviews::duplicate_review();
        }
    }
    AppError::Database(err)
}

/// Catalog store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_title(&self, id: Uuid) -> AppResult<Option<Title>> {
        let sql = format!("{} WHERE t.id = $1", TITLE_SELECT);
        let row = sqlx::query_as::<_, TitleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Title::from))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for PgStore {
    async fn resolve_token(&self, token: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.username, u.is_admin \
             FROM auth_tokens k JOIN users u ON u.id = k.user_id \
             WHERE k.key = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| User {
            id: row.id,
            username: row.username,
            is_admin: row.is_admin,
        }))
    }
}

#[async_trait::async_trait]
impl EntityStore for PgStore {
    async fn list_platforms(&self) -> AppResult<Vec<Platform>> {
        let rows = sqlx::query_as::<_, PlatformRow>(
            "SELECT id, name, about, website FROM platforms ORDER BY created, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Platform::from).collect())
    }

    async fn get_platform(&self, id: Uuid) -> AppResult<Platform> {
        sqlx::query_as::<_, PlatformRow>(
            "SELECT id, name, about, website FROM platforms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Platform::from)
        .ok_or_else(|| AppError::NotFound(format!("Platform {} not found", id)))
    }

    async fn insert_platform(&self, input: NewPlatform) -> AppResult<Platform> {
        let platform = Platform::new(input);
        sqlx::query("INSERT INTO platforms (id, name, about, website) VALUES ($1, $2, $3, $4)")
            .bind(platform.id)
            .bind(&platform.name)
            .bind(&platform.about)
            .bind(&platform.website)
            .execute(&self.pool)
            .await?;

        tracing::debug!(platform_id = %platform.id, "Inserted platform");
        Ok(platform)
    }

    async fn update_platform(&self, id: Uuid, input: NewPlatform) -> AppResult<Platform> {
        sqlx::query_as::<_, PlatformRow>(
            "UPDATE platforms SET name = $2, about = $3, website = $4 WHERE id = $1 \
             RETURNING id, name, about, website",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.about)
        .bind(&input.website)
        .fetch_optional(&self.pool)
        .await?
        .map(Platform::from)
        .ok_or_else(|| AppError::NotFound(format!("Platform {} not found", id)))
    }

    async fn delete_platform(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM platforms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Platform {} not found", id)));
        }
        Ok(())
    }

    async fn list_titles(&self, page: PageRequest) -> AppResult<(Vec<Title>, u64)> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM titles")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!("{} ORDER BY t.created, t.id LIMIT $1 OFFSET $2", TITLE_SELECT);
        let rows = sqlx::query_as::<_, TitleRow>(&sql)
            .bind(i64::from(page.page_size))
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok((
            rows.into_iter().map(Title::from).collect(),
            u64::try_from(count).unwrap_or(0),
        ))
    }

    async fn list_platform_titles(&self, platform_id: Uuid) -> AppResult<Vec<Title>> {
        let sql = format!("{} WHERE t.platform_id = $1 ORDER BY t.created, t.id", TITLE_SELECT);
        let rows = sqlx::query_as::<_, TitleRow>(&sql)
            .bind(platform_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Title::from).collect())
    }

    async fn get_title(&self, id: Uuid) -> AppResult<Title> {
        self.fetch_title(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Title {} not found", id)))
    }

    async fn insert_title(&self, input: NewTitle) -> AppResult<Title> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO titles (id, platform_id, name, storyline, active) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(input.platform_id)
        .bind(&input.name)
        .bind(&input.storyline)
        .bind(input.active)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        tracing::debug!(title_id = %id, platform_id = %input.platform_id, "Inserted title");
        self.get_title(id).await
    }

    async fn update_title(&self, id: Uuid, input: NewTitle) -> AppResult<Title> {
        let result = sqlx::query(
            "UPDATE titles SET platform_id = $2, name = $3, storyline = $4, active = $5 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.platform_id)
        .bind(&input.name)
        .bind(&input.storyline)
        .bind(input.active)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Title {} not found", id)));
        }
        self.get_title(id).await
    }

    async fn delete_title(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Title {} not found", id)));
        }
        Ok(())
    }

    async fn list_reviews(&self, filter: ReviewFilter) -> AppResult<Vec<Review>> {
        let sql = format!(
            "{} WHERE ($1::uuid IS NULL OR r.title_id = $1) \
             AND ($2::text IS NULL OR u.username = $2) \
             AND ($3::boolean IS NULL OR r.active = $3) \
             ORDER BY r.created, r.id",
            REVIEW_SELECT
        );
        let rows = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(filter.title_id)
            .bind(filter.reviewer_username)
            .bind(filter.active)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Review::try_from).collect()
    }

    async fn get_review(&self, id: Uuid) -> AppResult<Review> {
        let sql = format!("{} WHERE r.id = $1", REVIEW_SELECT);
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Review {} not found", id)))?
            .try_into()
    }

    async fn create_review(
        &self,
        title_id: Uuid,
        reviewer: User,
        input: NewReview,
    ) -> AppResult<(Review, Title)> {
        let mut tx = self.pool.begin().await?;

        // row lock serializes concurrent submissions for the same title
        let sql = format!("{} WHERE t.id = $1 FOR UPDATE OF t", TITLE_SELECT);
        let mut title: Title = sqlx::query_as::<_, TitleRow>(&sql)
            .bind(title_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(Title::from)
            .ok_or_else(|| AppError::NotFound(format!("Title {} not found", title_id)))?;

        let already_reviewed: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE title_id = $1 AND reviewer_id = $2)",
        )
        .bind(title_id)
        .bind(reviewer.id)
        .fetch_one(&mut *tx)
        .await?;

        reviews::admit(&mut title, already_reviewed, input.rating)?;

        sqlx::query("UPDATE titles SET average_rating = $2, rating_count = $3 WHERE id = $1")
            .bind(title_id)
            .bind(title.average_rating)
            .bind(title.rating_count)
            .execute(&mut *tx)
            .await?;

        let review = Review::new(title_id, reviewer.id, reviewer.username, input);
        sqlx::query(
            "INSERT INTO reviews \
             (id, title_id, reviewer_id, rating, description, active, created, updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(review.id)
        .bind(review.title_id)
        .bind(review.reviewer_id)
        .bind(review.rating.value())
        .bind(&review.description)
        .bind(review.active)
        .bind(review.created)
        .bind(review.updated)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await?;

        tracing::debug!(
            review_id = %review.id,
            title_id = %title_id,
            rating_count = title.rating_count,
            "Review committed"
        );

        Ok((review, title))
    }

    async fn update_review(&self, id: Uuid, input: NewReview) -> AppResult<Review> {
        let result = sqlx::query(
            "UPDATE reviews SET rating = $2, description = $3, active = $4, updated = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.rating.value())
        .bind(&input.description)
        .bind(input.active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Review {} not found", id)));
        }
        self.get_review(id).await
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Review {} not found", id)));
        }
        Ok(())
    }
}
