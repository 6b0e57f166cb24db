mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{json_body, TestApp};
use watchlist_api::services::{Rate, ThrottleRates};

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_platform_writes_require_admin() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    let user = app.login("viewer", false).await;
    let platform = json!({
        "name": "Netflix",
        "about": "Streaming Platform",
        "website": "https://www.netflix.com"
    });

    let response = app.post("/platforms", None, platform.clone()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.post("/platforms", Some(&user), platform.clone()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post("/platforms", Some(&admin), platform).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["name"], "Netflix");
    assert_eq!(created["titles"], json!([]));

    // Reads are open to everyone
    let response = app.get("/platforms", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let platforms = json_body(response).await;
    assert_eq!(platforms.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_platform_lists_its_titles() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    let title_id = app.seed_title(&admin, "Stranger Things").await;

    let title = json_body(app.get(&format!("/titles/{}", title_id), None).await).await;
    let platform_id = title["platform_id"].as_str().unwrap().to_string();

    let response = app.get(&format!("/platforms/{}", platform_id), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let platform = json_body(response).await;
    assert_eq!(platform["titles"][0]["name"], "Stranger Things");
    assert_eq!(platform["titles"][0]["platform"], "Netflix");
}

#[tokio::test]
async fn test_invalid_platform_website_is_rejected() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;

    let response = app
        .post(
            "/platforms",
            Some(&admin),
            json!({ "name": "Netflix", "website": "netflix" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["field"], "website");
}

#[tokio::test]
async fn test_short_title_name_is_rejected() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    let title_id = app.seed_title(&admin, "Dark").await;
    let title = json_body(app.get(&format!("/titles/{}", title_id), None).await).await;

    let response = app
        .post(
            "/titles",
            Some(&admin),
            json!({ "platform_id": title["platform_id"], "name": "X" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["field"], "name");
    assert_eq!(body["error"], "Name must be at least 2 characters long");
}

#[tokio::test]
async fn test_title_for_missing_platform_is_rejected() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;

    let response = app
        .post(
            "/titles",
            Some(&admin),
            json!({ "platform_id": uuid::Uuid::new_v4(), "name": "Orphan" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["field"], "platform_id");
}

#[tokio::test]
async fn test_titles_are_paginated() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    for name in ["Dark", "Ozark", "Narcos"] {
        app.seed_title(&admin, name).await;
    }

    let response = app.get("/titles?page=1&page_size=2", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["count"], 3);
    assert_eq!(page["next"], 2);
    assert_eq!(page["previous"], json!(null));
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(page["results"][0]["name"], "Dark");

    let page = json_body(app.get("/titles?page=2&page_size=2", None).await).await;
    assert_eq!(page["next"], json!(null));
    assert_eq!(page["previous"], 1);
    assert_eq!(page["results"][0]["name"], "Narcos");

    let response = app.get("/titles?page=3&page_size=2", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_title_is_not_found() {
    let app = TestApp::new();
    let response = app
        .get(&format!("/titles/{}", uuid::Uuid::new_v4()), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_updates_rating_aggregate() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    let alice = app.login("alice", false).await;
    let bob = app.login("bob", false).await;
    let title_id = app.seed_title(&admin, "Stranger Things").await;
    let reviews_uri = format!("/titles/{}/reviews", title_id);

    let response = app
        .post(
            &reviews_uri,
            Some(&alice),
            json!({ "rating": 5, "description": "Great" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let review = json_body(response).await;
    assert_eq!(review["reviewer"], "alice");
    assert_eq!(review["rating"], 5);

    let response = app.post(&reviews_uri, Some(&bob), json!({ "rating": 3 })).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let title = json_body(app.get(&format!("/titles/{}", title_id), None).await).await;
    assert_eq!(title["average_rating"], 4.0);
    assert_eq!(title["rating_count"], 2);

    // A second review by the same user is refused and leaves the aggregate alone
    let response = app.post(&reviews_uri, Some(&alice), json!({ "rating": 1 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "You have already reviewed this title.");

    let title = json_body(app.get(&format!("/titles/{}", title_id), None).await).await;
    assert_eq!(title["average_rating"], 4.0);
    assert_eq!(title["rating_count"], 2);

    let reviews = json_body(app.get(&reviews_uri, None).await).await;
    assert_eq!(reviews.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_review_rating_out_of_range_is_rejected() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    let alice = app.login("alice", false).await;
    let title_id = app.seed_title(&admin, "Dark").await;

    let response = app
        .post(
            &format!("/titles/{}/reviews", title_id),
            Some(&alice),
            json!({ "rating": 6 }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["field"], "rating");

    let title = json_body(app.get(&format!("/titles/{}", title_id), None).await).await;
    assert_eq!(title["rating_count"], 0);
}

#[tokio::test]
async fn test_anonymous_review_is_unauthorized() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    let title_id = app.seed_title(&admin, "Dark").await;

    let response = app
        .post(&format!("/titles/{}/reviews", title_id), None, json!({ "rating": 4 }))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_review_of_missing_title_is_not_found() {
    let app = TestApp::new();
    let alice = app.login("alice", false).await;

    let response = app
        .post(
            &format!("/titles/{}/reviews", uuid::Uuid::new_v4()),
            Some(&alice),
            json!({ "rating": 4 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_reviewer_may_change_review() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    let alice = app.login("alice", false).await;
    let mallory = app.login("mallory", false).await;
    let title_id = app.seed_title(&admin, "Dark").await;

    let review = json_body(
        app.post(
            &format!("/titles/{}/reviews", title_id),
            Some(&alice),
            json!({ "rating": 4 }),
        )
        .await,
    )
    .await;
    let review_uri = format!("/reviews/{}", review["id"].as_str().unwrap());
    let update = json!({ "rating": 2, "description": "Changed my mind" });

    let response = app
        .send(Method::PUT, &review_uri, Some(&mallory), Some(update.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(Method::DELETE, &review_uri, Some(&mallory), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(Method::PUT, &review_uri, Some(&alice), Some(update))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert_eq!(updated["rating"], 2);
    assert_eq!(updated["description"], "Changed my mind");

    // Anyone may read it
    let response = app.get(&review_uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(Method::DELETE, &review_uri, Some(&alice), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get(&review_uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_filters() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    let alice = app.login("alice", false).await;
    let bob = app.login("bob", false).await;
    let dark = app.seed_title(&admin, "Dark").await;
    let ozark = app.seed_title(&admin, "Ozark").await;

    for (title, token, active) in [
        (&dark, &alice, true),
        (&dark, &bob, false),
        (&ozark, &alice, true),
    ] {
        let response = app
            .post(
                &format!("/titles/{}/reviews", title),
                Some(token),
                json!({ "rating": 4, "active": active }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let reviews = json_body(
        app.get(&format!("/titles/{}/reviews?reviewer__username=bob", dark), None)
            .await,
    )
    .await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    assert_eq!(reviews[0]["reviewer"], "bob");

    let reviews = json_body(
        app.get(&format!("/titles/{}/reviews?active=true", dark), None)
            .await,
    )
    .await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    assert_eq!(reviews[0]["reviewer"], "alice");

    let reviews = json_body(app.get("/reviews?username=alice", None).await).await;
    assert_eq!(reviews.as_array().unwrap().len(), 2);

    let reviews = json_body(app.get("/reviews", None).await).await;
    assert_eq!(reviews, json!([]));
}

#[tokio::test]
async fn test_review_creation_is_throttled() {
    let app = TestApp::with_rates(ThrottleRates {
        review_create: Rate::new(1, 86400),
        ..ThrottleRates::default()
    });
    let admin = app.login("admin", true).await;
    let alice = app.login("alice", false).await;
    let dark = app.seed_title(&admin, "Dark").await;
    let ozark = app.seed_title(&admin, "Ozark").await;

    let response = app
        .post(&format!("/titles/{}/reviews", dark), Some(&alice), json!({ "rating": 5 }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .post(&format!("/titles/{}/reviews", ozark), Some(&alice), json!({ "rating": 5 }))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    let body = json_body(response).await;
    assert!(body["retry_after"].as_u64().unwrap() <= 86400);

    // The refused review never touched the aggregate
    let title = json_body(app.get(&format!("/titles/{}", ozark), None).await).await;
    assert_eq!(title["rating_count"], 0);
}

#[tokio::test]
async fn test_anonymous_reads_are_throttled() {
    let app = TestApp::with_rates(ThrottleRates {
        anon: Rate::new(2, 3600),
        ..ThrottleRates::default()
    });

    assert_eq!(app.get("/titles", None).await.status(), StatusCode::OK);
    assert_eq!(app.get("/titles", None).await.status(), StatusCode::OK);
    assert_eq!(
        app.get("/titles", None).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // Authenticated callers are outside the anonymous budget
    let alice = app.login("alice", false).await;
    assert_eq!(app.get("/titles", Some(&alice)).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_write_with_incomplete_body_is_unauthorized() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    let title_id = app.seed_title(&admin, "Dark").await;

    let response = app.post("/titles", None, json!({ "name": "Dark" })).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.post("/platforms", None, json!({})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post(
            &format!("/titles/{}/reviews", title_id),
            None,
            json!({ "description": "x" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(Method::PUT, &format!("/titles/{}", title_id), None, Some(json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejected_review_body_still_counts_against_budget() {
    let app = TestApp::with_rates(ThrottleRates {
        review_create: Rate::new(1, 86400),
        ..ThrottleRates::default()
    });
    let admin = app.login("admin", true).await;
    let alice = app.login("alice", false).await;
    let uri = format!("/titles/{}/reviews", app.seed_title(&admin, "Dark").await);

    let response = app.post(&uri, Some(&alice), json!({ "description": "x" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.post(&uri, Some(&alice), json!({ "rating": 4 })).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_bad_query_value_is_json_error() {
    let app = TestApp::new();
    let admin = app.login("admin", true).await;
    let title_id = app.seed_title(&admin, "Dark").await;

    let response = app
        .get(&format!("/titles/{}/reviews?active=yes", title_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["field"], "query");
}
