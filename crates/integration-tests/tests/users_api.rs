//! Identity surface: duplicate sign-up conflict, token revocation, and
//! account deletion rules.

use axum::http::StatusCode;
use serde_json::json;

use integration_tests::harness::TestApp;

#[tokio::test]
async fn test_duplicate_sign_up_conflicts() {
    let app = TestApp::spawn().await;
    app.sign_up("dupe", "dupe@test.com", "pw123").await;

    let (status, body) = app
        .request(
            "POST",
            "/users/sign-up",
            None,
            Some(json!({"username": "dupe", "email": "other@test.com", "password": "pw123"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "username or email already in use");
}

#[tokio::test]
async fn test_logout_all_revokes_the_token() {
    let app = TestApp::spawn().await;
    let token = app.member_token("leaver").await;

    let (status, _) = app.request("GET", "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request("POST", "/users/logout/all", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request("GET", "/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token has been revoked");

    // A fresh login issues a usable token again.
    let fresh = app.login("leaver", "pw123").await;
    let (status, _) = app.request("GET", "/users", Some(&fresh), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_token_validation_reports_state() {
    let app = TestApp::spawn().await;
    let token = app.member_token("checker").await;

    let (status, body) = app
        .request("POST", "/users/token/validation", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));

    let (status, _) = app
        .request("POST", "/users/token/validation", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_member_deletes_self_admin_deletes_anyone() {
    let app = TestApp::spawn().await;
    let victim_token = app.member_token("victim").await;
    let other_token = app.member_token("other").await;
    let admin = app.admin_token().await;

    let (_, users) = app.request("GET", "/users", Some(&admin), None).await;
    let victim_id = users
        .as_array()
        .unwrap()
        .iter()
        .find(|user| user["username"] == "victim")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    // Another member may not delete the account.
    let (status, _) = app
        .request(
            "DELETE",
            &format!("/users/{victim_id}"),
            Some(&other_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The admin may.
    let (status, _) = app
        .request("DELETE", &format!("/users/{victim_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The deleted account cannot log in and its token no longer resolves.
    let (status, _) = app
        .request(
            "POST",
            "/users/login",
            None,
            Some(json!({"username": "victim", "password": "pw123"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.request("GET", "/users", Some(&victim_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
