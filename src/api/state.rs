use std::sync::Arc;

use crate::{
    db::{EntityStore, IdentityProvider, MemoryStore},
    services::{Throttle, ThrottleRates},
};

/// Listing bounds shared by paginated handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: u32,
    pub max_page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: 10,
            max_page_size: 100,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub throttle: Arc<Throttle>,
    pub pagination: Pagination,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntityStore>,
        identity: Arc<dyn IdentityProvider>,
        throttle: Arc<Throttle>,
        pagination: Pagination,
    ) -> Self {
        Self {
            store,
            identity,
            throttle,
            pagination,
        }
    }

    /// State backed entirely by in-process storage
    pub fn in_memory(store: Arc<MemoryStore>, rates: ThrottleRates) -> Self {
        Self::new(
            store.clone(),
            store,
            Arc::new(Throttle::in_memory(rates)),
            Pagination::default(),
        )
    }
}
