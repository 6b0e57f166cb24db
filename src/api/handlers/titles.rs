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
        state::Pagination,
        AppState,
    },
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{Actor, NewTitle, Page, PageRequest, Title},
    services::{Operation, Permission, Scope},
};

const PERMISSIONS: &[Permission] = &[Permission::IsAdminOrReadOnly];
const SCOPES: &[Scope] = &[Scope::Anon];

#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub id: Uuid,
    /// Platform display name
    pub platform: String,
    pub platform_id: Uuid,
    pub name: String,
    pub storyline: String,
    pub active: bool,
    pub average_rating: f64,
    pub rating_count: i32,
    pub created: DateTime<Utc>,
}

impl From<&Title> for TitleResponse {
    fn from(title: &Title) -> Self {
        Self {
            id: title.id,
            platform: title.platform_name.clone(),
            platform_id: title.platform_id,
            name: title.name.clone(),
            storyline: title.storyline.clone(),
            active: title.active,
            average_rating: title.average_rating,
            rating_count: title.rating_count,
            created: title.created,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    fn resolve(&self, bounds: Pagination) -> AppResult<PageRequest> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::NotFound("Invalid page.".to_string()));
        }

        let page_size = self
            .page_size
            .unwrap_or(bounds.page_size)
            .clamp(1, bounds.max_page_size);

        Ok(PageRequest { page, page_size })
    }
}

/// List titles one page at a time
pub async fn list_titles(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
    actor: Actor,
) -> AppResult<Json<Page<TitleResponse>>> {
    gate(&state, &actor, Operation::Read, PERMISSIONS, SCOPES).await?;

    let request = query.resolve(state.pagination)?;
    let (titles, count) = state.store.list_titles(request).await?;
    let page = Page::new(request, count, titles)?;

    Ok(Json(page.map(|title| TitleResponse::from(&title))))
}

/// Get a single title
pub async fn get_title(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    actor: Actor,
) -> AppResult<Json<TitleResponse>> {
    gate(&state, &actor, Operation::Read, PERMISSIONS, SCOPES).await?;

    let title = state.store.get_title(id).await?;
    Ok(Json(TitleResponse::from(&title)))
}

/// Create a new title
pub async fn create_title(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    actor: Actor,
    body: Bytes,
) -> AppResult<(StatusCode, Json<TitleResponse>)> {
    gate(&state, &actor, Operation::Write, PERMISSIONS, SCOPES).await?;
    let input: NewTitle = parse_json(&body)?;
    input.validate()?;

    let title = state.store.insert_title(input).await?;

    tracing::info!(
        request_id = %request_id,
        title_id = %title.id,
        platform_id = %title.platform_id,
        "Title created"
    );

    Ok((StatusCode::CREATED, Json(TitleResponse::from(&title))))
}

/// Replace a title's writable fields
pub async fn update_title(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    actor: Actor,
    body: Bytes,
) -> AppResult<Json<TitleResponse>> {
    gate(&state, &actor, Operation::Write, PERMISSIONS, SCOPES).await?;
    let input: NewTitle = parse_json(&body)?;
    input.validate()?;

    let title = state.store.update_title(id, input).await?;

    tracing::info!(request_id = %request_id, title_id = %id, "Title updated");

    Ok(Json(TitleResponse::from(&title)))
}

/// Delete a title and its reviews
pub async fn delete_title(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    actor: Actor,
) -> AppResult<StatusCode> {
    gate(&state, &actor, Operation::Write, PERMISSIONS, SCOPES).await?;

    state.store.delete_title(id).await?;

    tracing::info!(request_id = %request_id, title_id = %id, "Title deleted");

    Ok(StatusCode::NO_CONTENT)
}
