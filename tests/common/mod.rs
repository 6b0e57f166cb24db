use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use watchlist_api::{
    api::{create_router, AppState},
    db::MemoryStore,
    services::ThrottleRates,
};

/// Router over a fresh in-memory store, with handles for seeding accounts
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rates(ThrottleRates::default())
    }

    pub fn with_rates(rates: ThrottleRates) -> Self {
        let store = Arc::new(MemoryStore::new());
        let router = create_router(AppState::in_memory(store.clone(), rates));
        Self { router, store }
    }

    /// Registers a user and returns a bearer token for them
    pub async fn login(&self, username: &str, is_admin: bool) -> String {
        let user = self.store.create_user(username, is_admin).await;
        self.store.issue_token(user.id).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Response<Body> {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Creates a platform and one of its titles as `admin`, returning the title ID
    pub async fn seed_title(&self, admin: &str, name: &str) -> String {
        let response = self
            .post(
                "/platforms",
                Some(admin),
                json!({
                    "name": "Netflix",
                    "about": "Streaming Platform",
                    "website": "https://www.netflix.com"
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let platform = json_body(response).await;

        let response = self
            .post(
                "/titles",
                Some(admin),
                json!({
                    "platform_id": platform["id"],
                    "name": name,
                    "storyline": "Sample storyline"
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let title = json_body(response).await;
        title["id"].as_str().unwrap().to_string()
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
