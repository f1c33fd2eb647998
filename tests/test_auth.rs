mod common;

use axum::http::StatusCode;

#[tokio::test]
async fn register_returns_user_and_token() {
    let env = common::TestEnv::start().await;
    let server = env.server();

    let response = server
        .post("/api/auth/register")
        .json(&serde_json::json!({
            "fullName": "Ada Lovelace",
            "email": "ada@example.com",
            "password": "analytical"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["user"]["email"].as_str(), Some("ada@example.com"));
    assert_eq!(body["user"]["role"].as_str(), Some("user"));
    assert!(body["user"].get("password").is_none());
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn register_duplicate_email() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();
    env.register(&server, "dup@example.com").await;

    let response = server
        .post("/api/auth/register")
        .json(&serde_json::json!({
            "fullName": "Someone Else",
            "email": "dup@example.com",
            "password": "another"
        }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn concurrent_registrations_create_one_account() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();
    let body = serde_json::json!({
        "fullName": "Twin",
        "email": "twin@example.com",
        "password": "password123"
    });

    let (a, b) = tokio::join!(
        async { server.post("/api/auth/register").json(&body).await },
        async { server.post("/api/auth/register").json(&body).await },
    );

    let mut statuses = vec![a.status_code(), b.status_code()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::BAD_REQUEST]);
    for response in [a, b] {
        if response.status_code() == StatusCode::BAD_REQUEST {
            let error: serde_json::Value = response.json();
            assert_eq!(error["message"].as_str(), Some("User already exists"));
        }
    }
}

#[tokio::test]
async fn login_and_me() {
    let env = common::TestEnv::start().await;
    let server = env.server();
    let (user_id, _) = env.register(&server, "me@example.com").await;

    let login = server
        .post("/api/auth/login")
        .json(&serde_json::json!({
            "email": "me@example.com",
            "password": "password123"
        }))
        .await;
    let token = login.json::<serde_json::Value>()["token"]
        .as_str()
        .unwrap()
        .to_string();

    let me = server
        .get("/api/auth/me")
        .authorization_bearer(&token)
        .await;
    let body: serde_json::Value = me.json();
    assert_eq!(body["_id"].as_str(), Some(user_id.as_str()));
    assert_eq!(body["fullName"].as_str(), Some("Test User"));
}

#[tokio::test]
async fn login_invalid_credentials() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();
    env.register(&server, "user@example.com").await;

    let response = server
        .post("/api/auth/login")
        .json(&serde_json::json!({
            "email": "user@example.com",
            "password": "wrongpassword"
        }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    server.get("/api/auth/me").await.assert_status_unauthorized();
    server.get("/api/documents").await.assert_status_unauthorized();
}

#[tokio::test]
async fn forged_token_is_forbidden() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    let forged = docmind::auth::token::TokenService::new("some-other-secret", 1)
        .issue(&bson::oid::ObjectId::new(), docmind::auth::models::Role::Admin)
        .unwrap();

    let response = server
        .get("/api/documents")
        .authorization_bearer(&forged)
        .await;
    response.assert_status_forbidden();

    let garbage = server
        .get("/api/documents")
        .authorization_bearer("not-a-jwt")
        .await;
    garbage.assert_status_forbidden();
}

#[tokio::test]
async fn health_check() {
    let env = common::TestEnv::start().await;
    let server = env.server();

    let body: serde_json::Value = server.get("/").await.json();
    assert!(body["message"].as_str().is_some());
}
