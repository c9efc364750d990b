use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use claimflow::{
    config::Config,
    create_router,
    store::{seed_demo_data, MemoryStore},
    AppState,
};

async fn app() -> Router {
    let config = Config::from_lookup(|key| match key {
        "JWT_SECRET" => Some("test-secret".to_string()),
        _ => None,
    })
    .unwrap();

    let store = Arc::new(MemoryStore::new());
    seed_demo_data(store.as_ref()).await.unwrap();
    create_router(AppState::new(store, &config))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

// Sends `body` verbatim, with whatever Content-Type the caller picks (or none).
async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    token: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn login(app: &Router, email: &str) -> (String, String) {
    let (status, body) = send(app, Method::POST, "/login", None, Some(json!({ "email": email }))).await;
    assert_eq!(status, StatusCode::OK, "login failed for {}: {}", email, body);
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

fn client_lunch() -> Value {
    json!({
        "amount": 75,
        "currency": "USD",
        "category": "Food",
        "description": "Client Lunch",
        "date": "2024-05-12"
    })
}

#[tokio::test]
async fn submit_and_approve_flow() {
    let app = app().await;
    let (carlos, carlos_id) = login(&app, "carlos@innovate.com").await;
    let (ben, ben_id) = login(&app, "ben@innovate.com").await;

    let (status, expense) = send(&app, Method::POST, "/expenses", Some(&carlos), Some(client_lunch())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(expense["status"], "Pending");
    assert_eq!(expense["approval_history"], json!([]));
    assert_eq!(expense["user_id"], carlos_id.as_str());
    assert_eq!(expense["amount"], "75");

    let id = expense["id"].as_str().unwrap();
    let uri = format!("/expenses/{}/approve", id);
    let (status, approved) = send(&app, Method::POST, &uri, Some(&ben), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "Approved");
    let history = approved["approval_history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["approver_id"], ben_id.as_str());
    assert_eq!(history[0]["status"], "Approved");

    // A second decision is observably rejected.
    let reject_uri = format!("/expenses/{}/reject", id);
    let (status, _) = send(&app, Method::POST, &reject_uri, Some(&ben), Some(json!({ "comment": "late" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&app, Method::POST, &uri, Some(&ben), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn reject_records_comment() {
    let app = app().await;
    let (carlos, _) = login(&app, "carlos@innovate.com").await;
    let (alicia, _) = login(&app, "alicia@innovate.com").await;

    let (_, expense) = send(&app, Method::POST, "/expenses", Some(&carlos), Some(client_lunch())).await;
    let uri = format!("/expenses/{}/reject", expense["id"].as_str().unwrap());
    let (status, rejected) = send(&app, Method::POST, &uri, Some(&alicia), Some(json!({ "comment": "Duplicate claim" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "Rejected");
    assert_eq!(rejected["approval_history"][0]["comment"], "Duplicate claim");
}

#[tokio::test]
async fn comment_without_json_content_type_is_kept() {
    let app = app().await;
    let (carlos, _) = login(&app, "carlos@innovate.com").await;
    let (ben, _) = login(&app, "ben@innovate.com").await;

    let (_, expense) = send(&app, Method::POST, "/expenses", Some(&carlos), Some(client_lunch())).await;
    let uri = format!("/expenses/{}/reject", expense["id"].as_str().unwrap());
    let (status, rejected) = send_raw(&app, Method::POST, &uri, &ben, None, r#"{"comment":"Missing receipt"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["approval_history"][0]["comment"], "Missing receipt");
}

#[tokio::test]
async fn malformed_decision_body_leaves_expense_pending() {
    let app = app().await;
    let (carlos, _) = login(&app, "carlos@innovate.com").await;
    let (ben, _) = login(&app, "ben@innovate.com").await;

    let (_, expense) = send(&app, Method::POST, "/expenses", Some(&carlos), Some(client_lunch())).await;
    let id = expense["id"].as_str().unwrap();
    let uri = format!("/expenses/{}/reject", id);

    for body in [r#"{"comment": 42}"#, "Missing receipt", r#"{"note":"typo"}"#] {
        let (status, error) = send_raw(&app, Method::POST, &uri, &ben, Some("application/json"), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
        assert!(error["error"].is_string());
    }

    let (_, stored) = send(&app, Method::GET, &format!("/expenses/{}", id), Some(&ben), None).await;
    assert_eq!(stored["status"], "Pending");
    assert_eq!(stored["approval_history"], json!([]));
}

#[tokio::test]
async fn malformed_ids_get_json_errors() {
    let app = app().await;
    let (ben, _) = login(&app, "ben@innovate.com").await;
    let (alicia, _) = login(&app, "alicia@innovate.com").await;

    for (method, uri, token) in [
        (Method::GET, "/expenses/not-a-uuid", &ben),
        (Method::POST, "/expenses/not-a-uuid/approve", &ben),
        (Method::POST, "/expenses/42/reject", &ben),
        (Method::DELETE, "/team/users/not-a-uuid", &alicia),
    ] {
        let (status, body) = send(&app, method, uri, Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string(), "{}", uri);
    }
}

#[tokio::test]
async fn authorization_failures_are_forbidden() {
    let app = app().await;
    let (carlos, _) = login(&app, "carlos@innovate.com").await;
    let (ben, _) = login(&app, "ben@innovate.com").await;

    // Employee acting on someone else's expense.
    let (_, bens_expense) = send(&app, Method::POST, "/expenses", Some(&ben), Some(client_lunch())).await;
    let uri = format!("/expenses/{}/approve", bens_expense["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::POST, &uri, Some(&carlos), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Manager acting on their own expense.
    let (status, _) = send(&app, Method::POST, &uri, Some(&ben), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Employee reading a colleague's expense.
    let detail = format!("/expenses/{}", bens_expense["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::GET, &detail, Some(&carlos), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_expense_is_not_found() {
    let app = app().await;
    let (ben, _) = login(&app, "ben@innovate.com").await;
    let uri = format!("/expenses/{}/approve", uuid::Uuid::new_v4());
    let (status, body) = send(&app, Method::POST, &uri, Some(&ben), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = app().await;
    let (status, _) = send(&app, Method::GET, "/expenses", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/expenses", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::POST, "/login", None, Some(json!({ "email": "nobody@innovate.com" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cookie_from_login_authenticates() {
    let app = app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "email": "ben@innovate.com" }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    let pair = set_cookie.split(';').next().unwrap().to_string();
    assert!(pair.starts_with("auth_token="));

    let request = Request::builder()
        .uri("/me")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let me: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(me["role"], "Manager");
    assert_eq!(me["has_expense_approval"], true);
    assert_eq!(me["has_team_manage"], false);
}

#[tokio::test]
async fn invalid_submissions_are_bad_requests() {
    let app = app().await;
    let (carlos, _) = login(&app, "carlos@innovate.com").await;

    let mut zero = client_lunch();
    zero["amount"] = json!(0);
    let (status, _) = send(&app, Method::POST, "/expenses", Some(&carlos), Some(zero)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut blank = client_lunch();
    blank["description"] = json!("");
    let (status, _) = send(&app, Method::POST, "/expenses", Some(&carlos), Some(blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for amount in ["0.001", "12345678901234"] {
        let mut precise = client_lunch();
        precise["amount"] = json!(amount);
        let (status, _) = send(&app, Method::POST, "/expenses", Some(&carlos), Some(precise)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "amount {}", amount);
    }

    let mut category = client_lunch();
    category["category"] = json!("Entertainment");
    let (status, _) = send(&app, Method::POST, "/expenses", Some(&carlos), Some(category)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/expenses?status=Lost", Some(&carlos), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_filters_by_status_and_scope() {
    let app = app().await;
    let (carlos, carlos_id) = login(&app, "carlos@innovate.com").await;
    let (ben, ben_id) = login(&app, "ben@innovate.com").await;

    let (status, pending) = send(&app, Method::GET, "/expenses?status=Pending&user_id=", Some(&ben), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (_, all) = send(&app, Method::GET, "/expenses", Some(&ben), None).await;
    assert_eq!(all.as_array().unwrap().len(), 4);

    let uri = format!("/expenses?user_id={}", ben_id);
    let (_, bens) = send(&app, Method::GET, &uri, Some(&ben), None).await;
    assert_eq!(bens.as_array().unwrap().len(), 1);

    // Employees only ever see their own, whatever they ask for.
    let (_, own) = send(&app, Method::GET, &uri, Some(&carlos), None).await;
    let own = own.as_array().unwrap();
    assert_eq!(own.len(), 2);
    assert!(own.iter().all(|e| e["user_id"] == carlos_id.as_str()));
}

#[tokio::test]
async fn dashboard_summarizes_company_expenses() {
    let app = app().await;
    let (ben, _) = login(&app, "ben@innovate.com").await;

    let (status, summary) = send(&app, Method::GET, "/dashboard", Some(&ben), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_pending"], 1);
    assert_eq!(summary["total_approved"], 2);
    assert_eq!(summary["total_rejected"], 1);
    assert_eq!(summary["currency"], "USD");
    assert_eq!(summary["total_spent"], "450");
    assert_eq!(summary["pending_for_approval"].as_array().unwrap().len(), 1);
    assert_eq!(summary["monthly"].as_array().unwrap().len(), 6);

    let (carlos, _) = login(&app, "carlos@innovate.com").await;
    let (_, summary) = send(&app, Method::GET, "/dashboard", Some(&carlos), None).await;
    assert_eq!(summary["pending_for_approval"], json!([]));
}

#[tokio::test]
async fn team_management_requires_admin() {
    let app = app().await;
    let (ben, ben_id) = login(&app, "ben@innovate.com").await;
    let (alicia, _) = login(&app, "alicia@innovate.com").await;

    let new_user = json!({
        "name": "Dana Lee",
        "email": "dana@innovate.com",
        "role": "Employee",
        "manager_id": ben_id
    });

    let (status, _) = send(&app, Method::POST, "/team/users", Some(&ben), Some(new_user.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = send(&app, Method::POST, "/team/users", Some(&alicia), Some(new_user.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["manager_id"], ben_id.as_str());

    let (status, _) = send(&app, Method::POST, "/team/users", Some(&alicia), Some(new_user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, team) = send(&app, Method::GET, "/team/users", Some(&ben), None).await;
    assert_eq!(team.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn signup_creates_isolated_company() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/signup",
        None,
        Some(json!({
            "company_name": "Northwind",
            "currency": "eur",
            "user_name": "Erin Park",
            "email": "erin@northwind.com"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "Admin");
    assert_eq!(body["company"]["currency"], "EUR");

    let erin = body["token"].as_str().unwrap();
    let (_, expenses) = send(&app, Method::GET, "/expenses", Some(erin), None).await;
    assert_eq!(expenses, json!([]));

    // An admin elsewhere cannot decide Innovate's pending expense.
    let (ben, _) = login(&app, "ben@innovate.com").await;
    let (_, pending) = send(&app, Method::GET, "/expenses?status=Pending", Some(&ben), None).await;
    let uri = format!("/expenses/{}/approve", pending[0]["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::POST, &uri, Some(erin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_edits_and_removes_team_members() {
    let app = app().await;
    let (ben, ben_id) = login(&app, "ben@innovate.com").await;
    let (alicia, alicia_id) = login(&app, "alicia@innovate.com").await;
    let (_, carlos_id) = login(&app, "carlos@innovate.com").await;

    let (_, dana) = send(
        &app,
        Method::POST,
        "/team/users",
        Some(&alicia),
        Some(json!({ "name": "Dana Lee", "email": "dana@innovate.com", "role": "Employee", "manager_id": ben_id })),
    )
    .await;
    let dana_uri = format!("/team/users/{}", dana["id"].as_str().unwrap());

    let promoted = json!({ "name": "Dana Lee", "email": "dana.lee@innovate.com", "role": "Manager", "manager_id": alicia_id });
    let (status, _) = send(&app, Method::PUT, &dana_uri, Some(&ben), Some(promoted.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(&app, Method::PUT, &dana_uri, Some(&alicia), Some(promoted)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["role"], "Manager");
    assert_eq!(updated["email"], "dana.lee@innovate.com");
    assert_eq!(updated["manager_id"], alicia_id.as_str());

    let taken = json!({ "name": "Dana Lee", "email": "ben@innovate.com", "role": "Manager", "manager_id": null });
    let (status, _) = send(&app, Method::PUT, &dana_uri, Some(&alicia), Some(taken)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Carlos owns expenses and cannot be removed; Dana can.
    let carlos_uri = format!("/team/users/{}", carlos_id);
    let (status, _) = send(&app, Method::DELETE, &carlos_uri, Some(&alicia), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::DELETE, &dana_uri, Some(&alicia), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &dana_uri, Some(&alicia), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, team) = send(&app, Method::GET, "/team/users", Some(&alicia), None).await;
    assert_eq!(team.as_array().unwrap().len(), 3);
}
