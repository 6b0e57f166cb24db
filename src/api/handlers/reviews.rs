use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::gate;
use crate::{
    api::{
        extract::{parse_json, ApiPath, ApiQuery},
        AppState,
    },
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{Actor, Review, ReviewFilter, ReviewPayload},
    services::{authorize, Operation, Permission, Scope},
};

const LIST_SCOPES: &[Scope] = &[Scope::ReviewList, Scope::Anon];
const DETAIL_SCOPES: &[Scope] = &[Scope::ReviewDetail, Scope::Anon];
const CREATE_SCOPES: &[Scope] = &[Scope::ReviewCreate];

/// Review as returned to clients; the title is implied by the route
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    /// Reviewer's username
    pub reviewer: String,
    pub rating: i16,
    pub description: Option<String>,
    pub active: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            reviewer: review.reviewer_username,
            rating: review.rating.value(),
            description: review.description,
            active: review.active,
            created: review.created,
            updated: review.updated,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TitleReviewsQuery {
    #[serde(rename = "reviewer__username", alias = "reviewer")]
    pub reviewer_username: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserReviewsQuery {
    pub username: Option<String>,
}

fn respond(reviews: Vec<Review>) -> Json<Vec<ReviewResponse>> {
    Json(reviews.into_iter().map(ReviewResponse::from).collect())
}

/// List a title's reviews, optionally filtered by reviewer and active flag
pub async fn list_title_reviews(
    State(state): State<AppState>,
    ApiPath(title_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<TitleReviewsQuery>,
    actor: Actor,
) -> AppResult<Json<Vec<ReviewResponse>>> {
    gate(&state, &actor, Operation::Read, &[Permission::AllowAny], LIST_SCOPES).await?;

    let reviews = state
        .store
        .list_reviews(ReviewFilter {
            title_id: Some(title_id),
            reviewer_username: query.reviewer_username,
            active: query.active,
        })
        .await?;

    Ok(respond(reviews))
}

/// List every review written by `username`; no username matches nothing
pub async fn list_user_reviews(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserReviewsQuery>,
) -> AppResult<Json<Vec<ReviewResponse>>> {
    let Some(username) = query.username else {
        return Ok(Json(Vec::new()));
    };

    let reviews = state
        .store
        .list_reviews(ReviewFilter {
            reviewer_username: Some(username),
            ..Default::default()
        })
        .await?;

    Ok(respond(reviews))
}

/// Submit the caller's review of a title.
///
/// The reviewer and title come from the token and the path; the store checks
/// uniqueness, folds the rating into the title aggregate and inserts the
/// review as one unit.
pub async fn create_review(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiPath(title_id): ApiPath<Uuid>,
    actor: Actor,
    body: Bytes,
) -> AppResult<(StatusCode, Json<ReviewResponse>)> {
    gate(
        &state,
        &actor,
        Operation::Write,
        &[Permission::IsAuthenticated],
        CREATE_SCOPES,
    )
    .await?;

    let reviewer = actor
        .user()
        .cloned()
        .ok_or_else(|| AppError::Internal("Authenticated actor without user".to_string()))?;
    let payload: ReviewPayload = parse_json(&body)?;
    let input = payload.validate()?;

    tracing::info!(
        request_id = %request_id,
        title_id = %title_id,
        reviewer_id = %reviewer.id,
        rating = %input.rating,
        "Processing review submission"
    );

    let (review, title) = state.store.create_review(title_id, reviewer, input).await?;

    tracing::info!(
        request_id = %request_id,
        review_id = %review.id,
        average_rating = title.average_rating,
        rating_count = title.rating_count,
        "Review created"
    );

    Ok((StatusCode::CREATED, Json(ReviewResponse::from(review))))
}

/// Get a single review
pub async fn get_review(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    actor: Actor,
) -> AppResult<Json<ReviewResponse>> {
    gate(&state, &actor, Operation::Read, &[Permission::AllowAny], DETAIL_SCOPES).await?;

    let review = state.store.get_review(id).await?;
    Ok(Json(ReviewResponse::from(review)))
}

/// Loads a review for mutation once the caller has passed authentication and
/// throttling, then checks that the caller wrote it
async fn load_own_review(state: &AppState, actor: &Actor, id: Uuid) -> AppResult<Review> {
    gate(
        state,
        actor,
        Operation::Write,
        &[Permission::IsAuthenticated],
        DETAIL_SCOPES,
    )
    .await?;

    let review = state.store.get_review(id).await?;
    authorize(
        actor,
        Operation::Write,
        &[Permission::IsReviewerOrReadOnly {
            reviewer_id: review.reviewer_id,
        }],
    )?;
    Ok(review)
}

/// Replace the caller's own review. The title aggregate is not recomputed.
pub async fn update_review(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    actor: Actor,
    body: Bytes,
) -> AppResult<Json<ReviewResponse>> {
    load_own_review(&state, &actor, id).await?;
    let payload: ReviewPayload = parse_json(&body)?;
    let input = payload.validate()?;

    let review = state.store.update_review(id, input).await?;

    tracing::info!(request_id = %request_id, review_id = %id, "Review updated");

    Ok(Json(ReviewResponse::from(review)))
}

/// Delete the caller's own review
pub async fn delete_review(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    actor: Actor,
) -> AppResult<StatusCode> {
    load_own_review(&state, &actor, id).await?;

    state.store.delete_review(id).await?;

    tracing::info!(request_id = %request_id, review_id = %id, "Review deleted");

    Ok(StatusCode::NO_CONTENT)
}
