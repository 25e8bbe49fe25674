//! HTTP API tests.
//!
//! Drives the full router in-process with `tower::ServiceExt::oneshot`; no
//! listener is bound.
//!
//! Run with: `cargo test --test api_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use bookfair_reservations::{
    aggregates::{FairEnvironment, SequentialTokenGenerator},
    api::ACTOR_HEADER,
    config::InventoryConfig,
    events::{EventSink, InMemoryEventLog},
    server::{AppState, build_router},
    Engine,
};
use bookfair_testing::test_clock;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

async fn app() -> Router {
    let audit = Arc::new(InMemoryEventLog::new());
    let environment = FairEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(SequentialTokenGenerator::new()),
        Arc::clone(&audit) as Arc<dyn EventSink>,
    );
    let engine = Arc::new(Engine::new(environment));
    engine
        .seed(&InventoryConfig {
            halls: vec!["Hall A".to_string(), "Hall B".to_string()],
            stalls_per_hall: 4,
            price_small: 25_000,
            price_medium: 40_000,
            price_large: 60_000,
        })
        .await
        .unwrap();
    build_router(AppState::new(engine, audit))
}

fn vendor() -> String {
    format!("vendor:{}", Uuid::new_v4())
}

fn employee() -> String {
    format!("employee:{}", Uuid::new_v4())
}

fn admin() -> String {
    format!("admin:{}", Uuid::new_v4())
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    actor: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        request = request.header(ACTOR_HEADER, actor);
    }
    let request = match body {
        Some(body) => request
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn stall_id(app: &Router, code: &str) -> String {
    let (_, stalls) = call(app, Method::GET, "/api/stalls", None, None).await;
    stalls
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["code"] == code)
        .map(|s| s["stall_id"].as_str().unwrap().to_string())
        .unwrap()
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = call(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stalls"], 8);
}

#[tokio::test]
async fn test_anonymous_stall_map() {
    let app = app().await;
    let (status, stalls) = call(&app, Method::GET, "/api/stalls?hall=hall%20b", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stalls.as_array().unwrap().len(), 4);

    let (status, halls) = call(&app, Method::GET, "/api/availability/halls", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(halls[0]["status"], "AVAILABLE");

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/stalls/{}", Uuid::new_v4()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reserve_confirm_and_scan() {
    let app = app().await;
    let me = vendor();
    let b3 = stall_id(&app, "B-03").await;

    let (status, created) = call(
        &app,
        Method::POST,
        "/api/reservations",
        Some(&me),
        Some(json!({ "stall_ids": [b3] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "PENDING");
    assert_eq!(created["total_amount"], 60_000);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, confirmed) = call(
        &app,
        Method::POST,
        &format!("/api/reservations/{id}/confirm"),
        Some(&me),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = confirmed["admission_token"].as_str().unwrap().to_string();

    let (status, verdict) = call(
        &app,
        Method::POST,
        "/api/admission/verify",
        Some(&employee()),
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verdict["granted"], true);

    // Vendors cannot operate the gate.
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/admission/verify",
        Some(&me),
        Some(json!({ "token": "anything" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Staff see the occupant on the stall map.
    let (_, snapshot) = call(&app, Method::GET, "/api/availability", Some(&admin()), None).await;
    let held = snapshot["stalls"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["code"] == "B-03")
        .unwrap();
    assert_eq!(held["status"], "RESERVED");
    assert_eq!(held["occupant"]["reservation_id"], id.as_str());
}

#[tokio::test]
async fn test_losing_a_race_is_a_conflict_with_codes() {
    let app = app().await;
    let a1 = stall_id(&app, "A-01").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/reservations",
        Some(&vendor()),
        Some(json!({ "stall_ids": [a1] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/reservations",
        Some(&vendor()),
        Some(json!({ "stall_ids": [a1] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "STALL_ALREADY_RESERVED");
    assert_eq!(body["details"]["stall_codes"], json!(["A-01"]));
}

#[tokio::test]
async fn test_quota_is_unprocessable() {
    let app = app().await;
    let me = vendor();
    let mut ids = Vec::new();
    for code in ["A-01", "A-02", "A-03", "A-04"] {
        ids.push(stall_id(&app, code).await);
    }

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/reservations",
        Some(&me),
        Some(json!({ "stall_ids": ids })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "QUOTA_EXCEEDED");
    assert_eq!(body["details"]["current_count"], 0);
    assert_eq!(body["details"]["limit"], 3);
}

#[tokio::test]
async fn test_vendor_sees_active_count_against_quota() {
    let app = app().await;
    let me = vendor();
    let uri = "/api/reservations/mine/active";

    let (status, body) = call(&app, Method::GET, uri, Some(&me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_reservations"], 0);
    assert_eq!(body["remaining"], 3);

    let a1 = stall_id(&app, "A-01").await;
    let a2 = stall_id(&app, "A-02").await;
    call(
        &app,
        Method::POST,
        "/api/reservations",
        Some(&me),
        Some(json!({ "stall_ids": [a1, a2] })),
    )
    .await;

    let (_, body) = call(&app, Method::GET, uri, Some(&me), None).await;
    assert_eq!(body["active_reservations"], 1);
    assert_eq!(body["limit"], 3);
    assert_eq!(body["remaining"], 2);

    let (status, _) = call(&app, Method::GET, uri, Some(&employee()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_caller_header_is_required_and_checked() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/reservations/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/reservations/mine",
        Some("guest:nobody"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/admin/stalls",
        Some(&employee()),
        Some(json!({ "code": "C-01", "hall": "Hall C", "size": "LARGE", "price": 70_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cancel_release_and_reconcile() {
    let app = app().await;
    let me = vendor();
    let a1 = stall_id(&app, "A-01").await;
    let a2 = stall_id(&app, "A-02").await;

    let (_, created) = call(
        &app,
        Method::POST,
        "/api/reservations",
        Some(&me),
        Some(json!({ "stall_ids": [a1, a2] })),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, released) = call(
        &app,
        Method::DELETE,
        &format!("/api/reservations/{id}/stalls/{a1}"),
        Some(&me),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(released["line_items"].as_array().unwrap().len(), 1);

    let stale = Uuid::new_v4().to_string();
    let (status, report) = call(
        &app,
        Method::POST,
        "/api/reservations/reconcile",
        Some(&me),
        Some(json!({ "cached": [stale] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["stale"], json!([stale]));
    assert_eq!(report["missing"], json!([id]));

    for _ in 0..2 {
        let (status, cancelled) = call(
            &app,
            Method::POST,
            &format!("/api/reservations/{id}/cancel"),
            Some(&me),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "CANCELLED");
    }

    let (_, mine) = call(&app, Method::GET, "/api/reservations/mine", Some(&me), None).await;
    assert_eq!(mine[0]["status"], "CANCELLED");
}

#[tokio::test]
async fn test_admin_inventory_and_vendor_management() {
    let app = app().await;
    let boss = admin();

    let (status, stall) = call(
        &app,
        Method::POST,
        "/api/admin/stalls",
        Some(&boss),
        Some(json!({ "code": "c-01", "hall": "Hall C", "size": "LARGE", "price": 70_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(stall["code"], "C-01");
    let new_stall = stall["stall_id"].as_str().unwrap().to_string();

    let (status, repriced) = call(
        &app,
        Method::PUT,
        &format!("/api/admin/stalls/{new_stall}/price"),
        Some(&boss),
        Some(json!({ "price": 65_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repriced["price"], 65_000);

    let (status, disabled) = call(
        &app,
        Method::PUT,
        &format!("/api/admin/stalls/{new_stall}/disabled"),
        Some(&boss),
        Some(json!({ "disabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(disabled["status"], "DISABLED");

    let vendor_id = Uuid::new_v4();
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/admin/vendors",
        Some(&boss),
        Some(json!({
            "id": vendor_id,
            "name": "Kamal Silva",
            "email": "kamal@example.org",
            "contact_number": "+94 77 000 0000",
            "business_name": "Godage Publishers",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let a1 = stall_id(&app, "A-01").await;
    let (_, created) = call(
        &app,
        Method::POST,
        "/api/reservations",
        Some(&format!("vendor:{vendor_id}")),
        Some(json!({ "stall_ids": [a1] })),
    )
    .await;

    let (status, activity) = call(
        &app,
        Method::GET,
        &format!("/api/admin/vendors/{vendor_id}/active"),
        Some(&boss),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(activity["has_active_reservations"], true);

    let (status, body) = call(
        &app,
        Method::DELETE,
        &format!("/api/admin/vendors/{vendor_id}"),
        Some(&boss),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "VENDOR_HAS_ACTIVE_RESERVATIONS");

    let (_, listed) = call(
        &app,
        Method::GET,
        "/api/admin/reservations?status=PENDING",
        Some(&employee()),
        None,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["vendor"]["business_name"], "Godage Publishers");

    let id = created["id"].as_str().unwrap();
    call(
        &app,
        Method::POST,
        &format!("/api/reservations/{id}/cancel"),
        Some(&employee()),
        None,
    )
    .await;
    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/api/admin/vendors/{vendor_id}"),
        Some(&boss),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_payment_collection_requires_confirmation() {
    let app = app().await;
    let me = vendor();
    let a1 = stall_id(&app, "A-01").await;
    let (_, created) = call(
        &app,
        Method::POST,
        "/api/reservations",
        Some(&me),
        Some(json!({ "stall_ids": [a1] })),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    let payment_uri = format!("/api/admin/reservations/{id}/payment");

    let (status, body) = call(&app, Method::POST, &payment_uri, Some(&employee()), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");

    call(
        &app,
        Method::POST,
        &format!("/api/reservations/{id}/confirm"),
        Some(&me),
        None,
    )
    .await;
    let (status, paid) = call(&app, Method::POST, &payment_uri, Some(&employee()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["payment"]["status"], "COLLECTED");
}
