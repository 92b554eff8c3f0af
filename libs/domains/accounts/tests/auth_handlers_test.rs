//! Login, logout, refresh, current user, password and e-mail flows under
//! `/auth`.

mod common;

use axum::body::Body;
use axum::http::{Request, header};
use common::{TestApp, TestAppBuilder, json_body, json_request};
use domain_accounts::{EmailVerification, UserRepository};
use serde_json::{Value, json};

fn bearer(token: &Value) -> String {
    format!("Bearer {}", token.as_str().unwrap())
}

#[tokio::test]
async fn test_login_token_is_accepted_by_current_user() {
    let app = TestApp::new();
    app.register_alice().await;

    let login = app.login_alice().await;
    assert_eq!(login["user"]["username"], "alice");

    let response = app
        .get_with_token("/auth/user", login["access_token"].as_str().unwrap())
        .await;
    assert_eq!(response.status(), 200);

    let me: Value = json_body(response.into_body()).await;
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");
    assert_eq!(me["added_field"], "custom-value");
    assert_eq!(me["pk"], login["user"]["pk"]);
}

#[tokio::test]
async fn test_login_by_email_updates_last_login() {
    let app = TestApp::new();
    app.register_alice().await;

    let response = app
        .post(
            "/auth/login",
            json!({ "email": "alice@example.com", "password": "Str0ngPass!" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let user = app
        .repository
        .get_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert!(user.last_login.is_some());
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.register_alice().await;

    let response = app
        .post(
            "/auth/login",
            json!({ "username": "alice", "password": "Wr0ngPass!" }),
        )
        .await;
    assert_eq!(response.status(), 401);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["message"], "Unable to log in with provided credentials.");
}

#[tokio::test]
async fn test_login_without_identifier_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .post("/auth/login", json!({ "password": "Str0ngPass!" }))
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_inactive_user_cannot_log_in() {
    let app = TestApp::new();
    app.register_alice().await;

    let mut user = app
        .repository
        .get_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    user.is_active = false;
    app.repository.update(user).await.unwrap();

    let response = app
        .post(
            "/auth/login",
            json!({ "username": "alice", "password": "Str0ngPass!" }),
        )
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_current_user_requires_token() {
    let app = TestApp::new();

    let response = app.get("/auth/user").await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_current_user_accepts_cookie() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login_alice().await;

    let response = app
        .send(
            Request::builder()
                .uri("/auth/user")
                .header(
                    header::COOKIE,
                    format!("access_token={}", login["access_token"].as_str().unwrap()),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_logout_revokes_access_token() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login_alice().await;

    let mut request = json_request(
        "POST",
        "/auth/logout",
        json!({ "refresh_token": login["refresh_token"] }),
    );
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, bearer(&login["access_token"]).parse().unwrap());
    let response = app.send(request).await;
    assert_eq!(response.status(), 200);

    let cleared: Vec<_> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(cleared.iter().all(|c| c.contains("Max-Age=0")));

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["detail"], "Successfully logged out.");

    let response = app
        .get_with_token("/auth/user", login["access_token"].as_str().unwrap())
        .await;
    assert_eq!(response.status(), 401);

    let response = app
        .post(
            "/auth/token/refresh",
            json!({ "refresh_token": login["refresh_token"] }),
        )
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_logout_without_tokens_still_succeeds() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_refresh_issues_working_access_token() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login_alice().await;

    let response = app
        .post(
            "/auth/token/refresh",
            json!({ "refresh_token": login["refresh_token"] }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body: Value = json_body(response.into_body()).await;
    let response = app
        .get_with_token("/auth/user", body["access_token"].as_str().unwrap())
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login_alice().await;

    let response = app
        .post(
            "/auth/token/refresh",
            json!({ "refresh_token": login["access_token"] }),
        )
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_update_current_user_keeps_email() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login_alice().await;

    let mut request = json_request(
        "PATCH",
        "/auth/user",
        json!({ "added_field": "updated", "email": "new@example.com" }),
    );
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, bearer(&login["access_token"]).parse().unwrap());
    let response = app.send(request).await;
    assert_eq!(response.status(), 200);

    let me: Value = json_body(response.into_body()).await;
    assert_eq!(me["added_field"], "updated");
    assert_eq!(me["email"], "alice@example.com");
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login_alice().await;

    let change = |old: &str, new1: &str, new2: &str| {
        let mut request = json_request(
            "POST",
            "/auth/password/change",
            json!({ "old_password": old, "new_password1": new1, "new_password2": new2 }),
        );
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, bearer(&login["access_token"]).parse().unwrap());
        request
    };

    let response = app.send(change("Wr0ngPass!", "N3wPass!word", "N3wPass!word")).await;
    assert_eq!(response.status(), 400);

    let response = app.send(change("Str0ngPass!", "N3wPass!word", "Other1!pass")).await;
    assert_eq!(response.status(), 400);

    let response = app.send(change("Str0ngPass!", "N3wPass!word", "N3wPass!word")).await;
    assert_eq!(response.status(), 200);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["detail"], "New password has been saved.");

    let response = app
        .post(
            "/auth/login",
            json!({ "username": "alice", "password": "N3wPass!word" }),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_password_reset_token_works_once() {
    let app = TestApp::new();
    app.register_alice().await;

    let response = app
        .post("/auth/password/reset", json!({ "email": "alice@example.com" }))
        .await;
    assert_eq!(response.status(), 200);
    let mail = app.outbox.last_reset();

    let confirm = json!({
        "uid": mail.uid,
        "token": mail.token,
        "new_password1": "Res3t!Password",
        "new_password2": "Res3t!Password"
    });

    let response = app.post("/auth/password/reset/confirm", confirm.clone()).await;
    assert_eq!(response.status(), 200);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["detail"], "Password has been reset with the new password.");

    let response = app
        .post(
            "/auth/login",
            json!({ "username": "alice", "password": "Res3t!Password" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app.post("/auth/password/reset/confirm", confirm).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_password_reset_for_unknown_email_is_silent() {
    let app = TestApp::new();

    let response = app
        .post("/auth/password/reset", json!({ "email": "nobody@example.com" }))
        .await;
    assert_eq!(response.status(), 200);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["detail"], "Password reset e-mail has been sent.");
    assert!(app.outbox.resets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_confirmation_key_verifies_primary_address() {
    let app = TestApp::new();
    app.register_alice().await;
    let mail = app.outbox.last_confirmation();

    let response = app
        .post(
            "/auth/registration/verify-email",
            json!({ "key": mail.token }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["detail"], "ok");

    let addresses = app
        .repository
        .list_email_addresses(mail.user_id)
        .await
        .unwrap();
    assert!(addresses[0].primary && addresses[0].verified);
}

#[tokio::test]
async fn test_bad_confirmation_key_is_not_found() {
    let app = TestApp::new();

    let response = app
        .post(
            "/auth/registration/verify-email",
            json!({ "key": "not-a-key" }),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_mandatory_verification_blocks_login_until_verified() {
    let app = TestAppBuilder::new()
        .email_verification(EmailVerification::Mandatory)
        .build();
    app.post("/auth/registration", common::alice()).await;

    let credentials = json!({ "username": "alice", "password": "Str0ngPass!" });

    let response = app.post("/auth/login", credentials.clone()).await;
    assert_eq!(response.status(), 400);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["message"], "E-mail is not verified.");

    let key = app.outbox.last_confirmation().token;
    let response = app
        .post("/auth/registration/verify-email", json!({ "key": key }))
        .await;
    assert_eq!(response.status(), 200);

    let response = app.post("/auth/login", credentials).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_token_of_deleted_user_is_unauthorized() {
    let app = TestApp::new();
    let login = app.register_alice().await;
    let id: uuid::Uuid = serde_json::from_value(login["user"]["pk"].clone()).unwrap();

    assert!(app.repository.delete(id).await.unwrap());

    let access = login["access_token"].as_str().unwrap();
    let response = app.get_with_token("/auth/user", access).await;
    assert_eq!(response.status(), 401);

    let response = app
        .post(
            "/auth/token/refresh",
            json!({ "refresh_token": login["refresh_token"] }),
        )
        .await;
    assert_eq!(response.status(), 401);
}
