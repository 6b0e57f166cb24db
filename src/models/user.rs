use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An account resolved from an auth token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

/// Whoever is making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// No credential was presented
    Anonymous {
        /// Originating address, used as the throttle key
        client: String,
    },
    User(User),
}

impl Actor {
    pub fn user(&self) -> Option<&User> {
        match self {
            Actor::Anonymous { .. } => None,
            Actor::User(user) => Some(user),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Actor::Anonymous { .. })
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|user| user.is_admin)
    }

    /// Identifier that throttle budgets are counted against
    pub fn throttle_ident(&self) -> String {
        match self {
            Actor::Anonymous { client } => format!("addr:{}", client),
            Actor::User(user) => format!("user:{}", user.id),
        }
    }
}
