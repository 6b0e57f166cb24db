use axum::http::StatusCode;

use super::AppState;
use crate::{
    error::AppResult,
    models::Actor,
    services::{authorize, Operation, Permission, Scope},
};

pub mod platforms;
pub mod reviews;
pub mod titles;

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Evaluates the access chain and then the throttle scopes.
///
/// Handlers call this before touching the store, so a rejected request never
/// reads or writes catalog data.
async fn gate(
    state: &AppState,
    actor: &Actor,
    operation: Operation,
    permissions: &[Permission],
    scopes: &[Scope],
) -> AppResult<()> {
    authorize(actor, operation, permissions)?;
    state.throttle.check(actor, scopes).await
}
