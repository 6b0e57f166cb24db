//! Access policy.
//!
//! Each endpoint declares an ordered chain of [`Permission`]s. The chain is
//! evaluated before the handler body runs; the first denial wins.

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Actor,
};

/// Whether a request reads or mutates its resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    AllowAny,
    IsAuthenticated,
    /// Anyone may read; only administrators may write
    IsAdminOrReadOnly,
    /// Anyone may read; only the review's author may write
    IsReviewerOrReadOnly { reviewer_id: Uuid },
}

impl Permission {
    pub fn allows(&self, actor: &Actor, operation: Operation) -> bool {
        match self {
            Permission::AllowAny => true,
            Permission::IsAuthenticated => !actor.is_anonymous(),
            Permission::IsAdminOrReadOnly => {
                operation == Operation::Read || actor.is_admin()
            }
            Permission::IsReviewerOrReadOnly { reviewer_id } => {
                operation == Operation::Read
                    || actor.user().is_some_and(|user| user.id == *reviewer_id)
            }
        }
    }
}

/// Evaluates `chain` in order for `actor` performing `operation`.
///
/// An anonymous actor that is denied gets [`AppError::Unauthorized`]; an
/// authenticated one gets [`AppError::Forbidden`].
pub fn authorize(actor: &Actor, operation: Operation, chain: &[Permission]) -> AppResult<()> {
    for permission in chain {
        if permission.allows(actor, operation) {
            continue;
        }

        tracing::debug!(?permission, ?operation, "Access denied");

        return Err(if actor.is_anonymous() {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        } else {
            AppError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            )
        });
    }
    Ok(())
}
