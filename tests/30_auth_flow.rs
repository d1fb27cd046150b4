mod common;

use axum::http::{Method, StatusCode};
use common::{host, TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn same_email_registers_once_per_tenant() {
    let app = TestApp::new();
    app.tenant("Acme", "acme").await;
    app.tenant("Other", "other").await;

    app.register("acme", "dup@example.com").await;
    let res = app
        .post(&host("acme"), "/auth/register", None, json!({ "email": "DUP@example.com", "password": PASSWORD, "name": "Again" }))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.error_code(), "CONFLICT");

    // A different tenant is a different namespace
    app.register("other", "dup@example.com").await;
}

#[tokio::test]
async fn registration_reports_field_errors() {
    let app = TestApp::new();
    app.tenant("Acme", "acme").await;
    let res = app
        .post(&host("acme"), "/auth/register", None, json!({ "email": "not-an-email", "password": "short", "name": "" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let fields = &res.body["error"]["field_errors"];
    assert!(fields["email"].is_string());
    assert!(fields["password"].is_string());
    assert!(fields["name"].is_string());

    // Malformed JSON still answers with the envelope
    let res = app.post(&host("acme"), "/auth/register", None, json!({ "email": 7 })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error_code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn login_refresh_and_profile() {
    let app = TestApp::new();
    app.tenant("Acme", "acme").await;
    let session = app.register("acme", "a@example.com").await;

    let res = app
        .post(&session.host, "/auth/login", None, json!({ "email": "a@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["token_type"], "Bearer");
    let access = res.data()["access_token"].as_str().unwrap().to_string();

    let res = app.get(&session.host, "/api/auth/me", Some(&access)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["email"], "a@example.com");
    assert!(res.data()["last_login_at"].is_string());
    assert!(res.data().get("password_hash").is_none());

    let res = app.post(&session.host, "/auth/refresh", None, json!({ "refresh_token": session.refresh_token })).await;
    assert_eq!(res.status, StatusCode::OK);

    // An access token is not a refresh token
    let res = app.post(&session.host, "/auth/refresh", None, json!({ "refresh_token": access })).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // Nor is a refresh token an access token
    let res = app.get(&session.host, "/api/auth/me", Some(&session.refresh_token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_look_identical() {
    let app = TestApp::new();
    app.tenant("Acme", "acme").await;
    app.register("acme", "a@example.com").await;

    let wrong_password = app
        .post(&host("acme"), "/auth/login", None, json!({ "email": "a@example.com", "password": "wrong-password" }))
        .await;
    let unknown_user = app
        .post(&host("acme"), "/auth/login", None, json!({ "email": "nobody@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_user.body);
}

#[tokio::test]
async fn token_from_one_tenant_is_forbidden_on_another() {
    let app = TestApp::new();
    app.tenant("Acme", "acme").await;
    app.tenant("Other", "other").await;
    let session = app.register("acme", "a@example.com").await;

    let res = app.get(&host("other"), "/api/auth/me", Some(&session.token)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = app.get(&host("other"), "/api/todos", Some(&session.token)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    // Credentials are tenant-local as well
    let res = app
        .post(&host("other"), "/auth/login", None, json!({ "email": "a@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // Refreshing against the wrong tenant is rejected too
    let res = app.post(&host("other"), "/auth/refresh", None, json!({ "refresh_token": session.refresh_token })).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_or_malformed_credentials_are_unauthorized() {
    let app = TestApp::new();
    app.tenant("Acme", "acme").await;

    assert_eq!(app.get(&host("acme"), "/api/todos", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get(&host("acme"), "/api/todos", Some("not.a.jwt")).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_user_loses_access() {
    let app = TestApp::new();
    let acme = app.tenant("Acme", "acme").await;
    let admin = app.register_admin(&acme, "admin@example.com").await;
    let member = app.register("acme", "member@example.com").await;

    let path = format!("/api/root/users/{}/status", member.user_id);
    let res = app.patch(&admin.host, &path, Some(&admin.token), json!({ "active": false })).await;
    assert_eq!(res.status, StatusCode::OK);

    assert_eq!(app.get(&member.host, "/api/auth/me", Some(&member.token)).await.status, StatusCode::UNAUTHORIZED);
    let res = app
        .post(&member.host, "/auth/login", None, json!({ "email": "member@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_and_change() {
    let app = TestApp::new();
    app.tenant("Acme", "acme").await;
    let session = app.register("acme", "a@example.com").await;

    // Unknown accounts get the same answer, minus a token
    let res = app.post(&session.host, "/auth/forgot-password", None, json!({ "email": "nobody@example.com" })).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.data().get("reset_token").is_none());

    let res = app.post(&session.host, "/auth/forgot-password", None, json!({ "email": "a@example.com" })).await;
    let reset_token = res.data()["reset_token"].as_str().expect("token outside production").to_string();

    let res = app
        .post(&session.host, "/auth/reset-password", None, json!({ "token": reset_token, "new_password": "BrandNew123" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .post(&session.host, "/auth/login", None, json!({ "email": "a@example.com", "password": "BrandNew123" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    // Change requires the current password
    let res = app
        .request(
            Method::PUT,
            &session.host,
            "/api/auth/password",
            Some(&session.token),
            Some(json!({ "current_password": "wrong-one", "new_password": "Another123" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = app
        .request(
            Method::PUT,
            &session.host,
            "/api/auth/password",
            Some(&session.token),
            Some(json!({ "current_password": "BrandNew123", "new_password": "Another123" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn profile_update_keeps_email_unique() {
    let app = TestApp::new();
    app.tenant("Acme", "acme").await;
    let a = app.register("acme", "a@example.com").await;
    app.register("acme", "b@example.com").await;

    let res = app.patch(&a.host, "/api/auth/me", Some(&a.token), json!({ "email": "b@example.com" })).await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app.patch(&a.host, "/api/auth/me", Some(&a.token), json!({ "name": "Renamed" })).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["name"], "Renamed");
}
