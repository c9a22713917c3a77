//! API Integration Tests
//!
//! Drive the full router (middleware, handlers, services) over the
//! in-memory backend.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

mod common;

use common::{memory_app, TestApp};

fn post(uri: String, user_id: Uuid, machine_id: Option<Uuid>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-Request-User-Id", user_id.to_string());
    if let Some(machine_id) = machine_id {
        builder = builder.header("X-Machine-Id", machine_id.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: String, user_id: Uuid) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("X-Request-User-Id", user_id.to_string())
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = memory_app().await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_transfer_cash_out_deposit_e2e() {
    let app = memory_app().await;
    let (a, b) = (app.account_a, app.account_b);

    // 1. Transfer 30 from A to B
    let response = send(
        &app,
        post(
            format!("/api/v1/accounts/{}/transfer", a),
            app.user_id,
            None,
            json!({ "to": b, "amount": 30 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "Transfer failed");
    let json = json_body(response).await;
    assert_eq!(json["from_balance"], 70);
    assert_eq!(json["to_balance"], 80);

    // 2. Cash out everything from A
    let response = send(
        &app,
        post(
            format!("/api/v1/accounts/{}/cashout", a),
            app.user_id,
            Some(app.machine_id),
            json!({ "amount": 70 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "Cash-out failed");
    assert_eq!(json_body(response).await["balance"], 0);

    // 3. Overdraw is a conflict and changes nothing
    let response = send(
        &app,
        post(
            format!("/api/v1/accounts/{}/cashout", a),
            app.user_id,
            Some(app.machine_id),
            json!({ "amount": 9999 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error_code"], "insufficient_funds");

    // 4. Deposit into B
    let response = send(
        &app,
        post(
            format!("/api/v1/accounts/{}/deposit", b),
            app.user_id,
            Some(app.machine_id),
            json!({ "amount": 20 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "Deposit failed");

    // 5. Verify balances through the API
    let response = send(&app, get(format!("/api/v1/accounts/{}", a), app.user_id)).await;
    assert_eq!(json_body(response).await["balance"], 0);
    let response = send(&app, get(format!("/api/v1/accounts/{}", b), app.user_id)).await;
    assert_eq!(json_body(response).await["balance"], 100);

    assert_eq!(app.broker.wait_for(3).await.len(), 3);
}

#[tokio::test]
async fn test_unknown_machine_is_forbidden() {
    let app = memory_app().await;

    let response = send(
        &app,
        post(
            format!("/api/v1/accounts/{}/deposit", app.account_a),
            app.user_id,
            Some(Uuid::new_v4()),
            json!({ "amount": 10 }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error_code"], "machine_not_found");
    assert_eq!(app.db.balance_of(app.account_a).await, Some(100));
}

#[tokio::test]
async fn test_missing_headers() {
    let app = memory_app().await;

    // No machine header on a machine operation
    let response = send(
        &app,
        post(
            format!("/api/v1/accounts/{}/cashout", app.account_a),
            app.user_id,
            None,
            json!({ "amount": 10 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error_code"], "missing_header");

    // No user header at all
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/accounts")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Malformed user header
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/accounts")
        .header("X-Request-User-Id", "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validation_errors() {
    let app = memory_app().await;

    let response = send(
        &app,
        post(
            format!("/api/v1/accounts/{}/transfer", app.account_a),
            app.user_id,
            None,
            json!({ "to": app.account_b, "amount": 0 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error_code"], "invalid_amount");

    let response = send(
        &app,
        post(
            format!("/api/v1/accounts/{}/transfer", app.account_a),
            app.user_id,
            None,
            json!({ "to": app.account_a, "amount": 10 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error_code"], "same_account_transfer");
}

#[tokio::test]
async fn test_foreign_account_is_not_found() {
    let app = memory_app().await;
    let stranger = app.db.seed_user("petr@example.com", true).await;

    let response = send(
        &app,
        get(format!("/api/v1/accounts/{}", app.account_a), stranger.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        post(
            format!("/api/v1/accounts/{}/transfer", app.account_a),
            stranger.id,
            None,
            json!({ "to": app.account_b, "amount": 10 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.db.balance_of(app.account_a).await, Some(100));
}

#[tokio::test]
async fn test_account_lifecycle() {
    let app = memory_app().await;

    // Third account is allowed
    let response = send(
        &app,
        post("/api/v1/accounts".to_string(), app.user_id, None, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["balance"], 0);
    let new_id: Uuid = serde_json::from_value(created["id"].clone()).unwrap();

    // Fourth is not
    let response = send(
        &app,
        post("/api/v1/accounts".to_string(), app.user_id, None, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error_code"], "too_many_accounts");

    let response = send(&app, get("/api/v1/accounts".to_string(), app.user_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = json_body(response).await;
    assert_eq!(list["accounts"].as_array().unwrap().len(), 3);

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/accounts/{}", new_id))
        .header("X-Request-User-Id", app.user_id.to_string())
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.db.balance_of(new_id).await, None);
}

#[tokio::test]
async fn test_unverified_user_cannot_open_account() {
    let app = memory_app().await;
    let unverified = app.db.seed_user("anon@example.com", false).await;

    let response = send(
        &app,
        post("/api/v1/accounts".to_string(), unverified.id, None, json!({})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error_code"], "email_not_verified");
}

#[tokio::test]
async fn test_storage_failure_is_opaque() {
    let app = memory_app().await;
    app.db.fail_next_commit();

    let response = send(
        &app,
        post(
            format!("/api/v1/accounts/{}/deposit", app.account_a),
            app.user_id,
            Some(app.machine_id),
            json!({ "amount": 10 }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Internal server error");
    assert!(app.broker.events().is_empty());
}
