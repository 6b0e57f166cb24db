use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::{gate, titles::TitleResponse};
use crate::{
    api::{
        extract::{parse_json, ApiPath},
        AppState,
    },
    error::AppResult,
    middleware::request_id::RequestId,
    models::{Actor, NewPlatform, Platform, Title},
    services::{Operation, Permission, Scope},
};

const PERMISSIONS: &[Permission] = &[Permission::IsAdminOrReadOnly];
const SCOPES: &[Scope] = &[Scope::Anon];

#[derive(Debug, Serialize)]
pub struct PlatformResponse {
    pub id: Uuid,
    pub name: String,
    pub about: String,
    pub website: String,
    pub titles: Vec<TitleResponse>,
}

impl PlatformResponse {
    fn new(platform: Platform, titles: Vec<Title>) -> Self {
        Self {
            id: platform.id,
            name: platform.name,
            about: platform.about,
            website: platform.website,
            titles: titles.iter().map(TitleResponse::from).collect(),
        }
    }
}

/// List every platform with its titles
pub async fn list_platforms(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<Vec<PlatformResponse>>> {
    gate(&state, &actor, Operation::Read, PERMISSIONS, SCOPES).await?;

    let platforms = state.store.list_platforms().await?;
    let mut responses = Vec::with_capacity(platforms.len());
    for platform in platforms {
        let titles = state.store.list_platform_titles(platform.id).await?;
        responses.push(PlatformResponse::new(platform, titles));
    }

    Ok(Json(responses))
}

/// Get one platform with its titles
pub async fn get_platform(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    actor: Actor,
) -> AppResult<Json<PlatformResponse>> {
    gate(&state, &actor, Operation::Read, PERMISSIONS, SCOPES).await?;

    let platform = state.store.get_platform(id).await?;
    let titles = state.store.list_platform_titles(id).await?;
    Ok(Json(PlatformResponse::new(platform, titles)))
}

/// Create a new platform
pub async fn create_platform(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    actor: Actor,
    body: Bytes,
) -> AppResult<(StatusCode, Json<PlatformResponse>)> {
    gate(&state, &actor, Operation::Write, PERMISSIONS, SCOPES).await?;
    let input: NewPlatform = parse_json(&body)?;
    input.validate()?;

    let platform = state.store.insert_platform(input).await?;

    tracing::info!(
        request_id = %request_id,
        platform_id = %platform.id,
        "Platform created"
    );

    Ok((
        StatusCode::CREATED,
        Json(PlatformResponse::new(platform, Vec::new())),
    ))
}

/// Replace a platform's fields
pub async fn update_platform(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    actor: Actor,
    body: Bytes,
) -> AppResult<Json<PlatformResponse>> {
    gate(&state, &actor, Operation::Write, PERMISSIONS, SCOPES).await?;
    let input: NewPlatform = parse_json(&body)?;
    input.validate()?;

    let platform = state.store.update_platform(id, input).await?;
    let titles = state.store.list_platform_titles(id).await?;

    tracing::info!(request_id = %request_id, platform_id = %id, "Platform updated");

    Ok(Json(PlatformResponse::new(platform, titles)))
}

/// Delete a platform along with its titles and reviews
pub async fn delete_platform(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    actor: Actor,
) -> AppResult<StatusCode> {
    gate(&state, &actor, Operation::Write, PERMISSIONS, SCOPES).await?;

    state.store.delete_platform(id).await?;

    tracing::info!(request_id = %request_id, platform_id = %id, "Platform deleted");

    Ok(StatusCode::NO_CONTENT)
}
