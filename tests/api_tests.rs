// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP-level tests against the router with an in-memory store.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde_json::{json, Value};
use studio_sessions::time_utils::format_utc_rfc3339;
use tower::ServiceExt;

mod common;

/// Tomorrow on the hour, so created sessions are in the future.
fn tomorrow() -> DateTime<Utc> {
    (Utc::now() + Duration::days(1))
        .duration_trunc(Duration::hours(1))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn authed(method: &str, uri: &str, owner: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", common::create_test_jwt(owner)));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn window_query(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "start={}&end={}",
        format_utc_rfc3339(start),
        format_utc_rfc3339(end)
    )
}

/// Create a three-day daily rule for `owner` starting tomorrow.
async fn create_daily_rule(app: &Router, owner: &str) -> Value {
    let anchor = tomorrow();
    let (status, body) = send(
        app,
        authed(
            "POST",
            "/api/rules",
            owner,
            Some(json!({
                "name": "Conditioning",
                "anchor": format_utc_rfc3339(anchor),
                "recurrence_kind": "daily",
                "recurrence_end": format_utc_rfc3339(anchor + Duration::days(2)),
                "capacity": 10,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn test_health() {
    let (app, _) = common::create_test_app();
    let (status, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_api_requires_jwt() {
    let (app, _) = common::create_test_app();

    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/rules")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/occurrences?start=2024-08-01T00:00:00Z&end=2024-08-02T00:00:00Z")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_accepted() {
    let (app, _) = common::create_test_app();
    let token = common::create_test_jwt("coach-a");

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/occurrences?start=2024-08-01T00:00:00Z&end=2024-08-02T00:00:00Z")
            .header(header::COOKIE, format!("studio_token={}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_create_rule_and_list() {
    let (app, _) = common::create_test_app();
    let created = create_daily_rule(&app, "coach-a").await;
    assert_eq!(created["occurrences_created"], 3);
    assert_eq!(created["rule"]["owner_id"], "coach-a");
    assert_eq!(created["rule"]["recurrence_kind"], "daily");

    let query = window_query(tomorrow() - Duration::hours(1), tomorrow() + Duration::days(3));
    let (status, body) = send(
        &app,
        authed("GET", &format!("/api/occurrences?{}", query), "coach-a", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["owner_name"], "Alex Rivera");
    assert_eq!(rows[0]["status"], "pending");
    assert_eq!(rows[0]["capacity"], 10);

    let (status, body) = send(
        &app,
        Request::builder()
            .uri(format!("/public/occurrences?{}", query))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["owner_id"], "coach-a");
    assert_eq!(body[0]["occurrences"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_invalid_rule_returns_422() {
    let (app, _) = common::create_test_app();
    let (status, body) = send(
        &app,
        authed(
            "POST",
            "/api/rules",
            "coach-a",
            Some(json!({
                "anchor": format_utc_rfc3339(tomorrow()),
                "recurrence_kind": "weekly",
                "selected_weekdays": [1, 8],
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_bad_window_parameters() {
    let (app, _) = common::create_test_app();

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/public/occurrences?start=yesterday&end=2024-08-02T00:00:00Z")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/public/preview?start=2024-01-01T00:00:00Z&end=2024-12-01T00:00:00Z")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_cancel_occurrence_flow() {
    let (app, _) = common::create_test_app();
    let created = create_daily_rule(&app, "coach-a").await;
    let rule_id = created["rule"]["id"].as_str().unwrap().to_string();

    let (_, rows) = send(
        &app,
        authed("GET", &format!("/api/rules/{}/occurrences", rule_id), "coach-a", None),
    )
    .await;
    let occurrence_id = rows[0]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/occurrences/{}/cancel", occurrence_id);

    let (status, _) = send(&app, authed("POST", &uri, "coach-b", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, authed("POST", &uri, "coach-a", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "cancelled");

    let (status, body) = send(&app, authed("POST", &uri, "coach-a", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_cancelled");
}

#[tokio::test]
async fn test_cancel_date_and_delete_rule() {
    let (app, _) = common::create_test_app();
    let created = create_daily_rule(&app, "coach-a").await;
    let rule_id = created["rule"]["id"].as_str().unwrap().to_string();
    let date = tomorrow().date_naive() + Duration::days(1);

    let (status, body) = send(
        &app,
        authed(
            "POST",
            &format!("/api/rules/{}/cancel-date", rule_id),
            "coach-a",
            Some(json!({ "date": date.to_string() })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["occurrences_cancelled"], 1);

    let (status, _) = send(
        &app,
        authed("DELETE", &format!("/api/rules/{}", rule_id), "coach-b", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        authed("DELETE", &format!("/api/rules/{}", rule_id), "coach-a", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["occurrences_removed"], 3);

    let (status, _) = send(
        &app,
        authed("GET", &format!("/api/rules/{}/occurrences", rule_id), "coach-a", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_rule_via_put() {
    let (app, _) = common::create_test_app();
    let created = create_daily_rule(&app, "coach-a").await;
    let rule_id = created["rule"]["id"].as_str().unwrap().to_string();
    let anchor = tomorrow();

    let (status, body) = send(
        &app,
        authed(
            "PUT",
            &format!("/api/rules/{}", rule_id),
            "coach-a",
            Some(json!({
                "name": "Conditioning",
                "anchor": format_utc_rfc3339(anchor),
                "recurrence_kind": "daily",
                "recurrence_end": format_utc_rfc3339(anchor + Duration::days(4)),
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["occurrences_removed"], 3);
    assert_eq!(body["occurrences_created"], 5);
}

// ─── Tasks ───────────────────────────────────────────────────

#[tokio::test]
async fn test_tasks_require_shared_secret() {
    let (app, state) = common::create_test_app();

    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/tasks/sweep-completed")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/tasks/sweep-completed")
            .header(header::AUTHORIZATION, "Bearer wrong-secret")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A coach JWT is not a tasks credential.
    let (status, _) = send(&app, authed("POST", "/tasks/backfill-rules", "coach-a", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let secret = format!("Bearer {}", state.config.tasks_shared_secret);
    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/tasks/sweep-completed")
            .header(header::AUTHORIZATION, &secret)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modified_count"], 0);
}

#[tokio::test]
async fn test_backfill_task_reports_counts() {
    let (app, state) = common::create_test_app();
    create_daily_rule(&app, "coach-a").await;
    create_daily_rule(&app, "coach-b").await;

    let (status, body) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/tasks/backfill-rules")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", state.config.tasks_shared_secret),
            )
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rules_processed"], 2);
    assert_eq!(body["occurrences_created"], 0);
}
