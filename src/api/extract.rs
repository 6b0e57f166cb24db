use std::net::SocketAddr;

use axum::{
    async_trait,
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        ConnectInfo, FromRequestParts, Path, Query,
    },
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::de::DeserializeOwned;

use super::AppState;
use crate::{error::AppError, models::Actor};

/// Authorization schemes accepted in front of a token
const AUTH_SCHEMES: [&str; 2] = ["bearer", "token"];

/// Pulls the credential out of an `Authorization` header value.
///
/// Returns `Ok(None)` for schemes this service does not handle, which leaves
/// the request anonymous.
fn parse_credential(header: &str) -> Result<Option<&str>, AppError> {
    let mut parts = header.split_whitespace();
    let scheme = match parts.next() {
        Some(scheme) => scheme,
        None => return Ok(None),
    };

    if !AUTH_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }

    match (parts.next(), parts.next()) {
        (Some(token), None) => Ok(Some(token)),
        _ => Err(AppError::Unauthorized(
            "Invalid token header.".to_string(),
        )),
    }
}

fn client_address(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let client = client_address(parts);

        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => value
                .to_str()
                .map_err(|_| AppError::Unauthorized("Invalid token header.".to_string()))?,
            None => return Ok(Actor::Anonymous { client }),
        };

        let Some(token) = parse_credential(header)? else {
            return Ok(Actor::Anonymous { client });
        };

        match state.identity.resolve_token(token).await? {
            Some(user) => {
                tracing::debug!(user_id = %user.id, "Authenticated request");
                Ok(Actor::User(user))
            }
            None => Err(AppError::Unauthorized("Invalid token.".to_string())),
        }
    }
}

/// Decodes a JSON request body.
///
/// Write handlers take the raw body and call this only once the access and
/// throttle checks have passed.
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::validation("body", format!("Invalid JSON body: {}", e)))
}

/// Path extractor whose rejections use the service's error shape
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::validation("path", rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query-string extractor whose rejections use the service's error shape
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::validation("query", rejection.body_text()))?;
        Ok(Self(value))
    }
}
