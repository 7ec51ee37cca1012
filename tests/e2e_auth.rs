//! E2E tests for session enforcement and the OAuth callback guards

mod common;

use common::{TestServer, VALID_CODE};
use creator_growth::auth::{Session, create_session_token, create_state_token};

#[tokio::test]
async fn test_protected_routes_require_session() {
    let server = TestServer::new().await;

    let routes = [
        ("GET", "/api/instagram/connect"),
        ("POST", "/api/instagram/refresh"),
        ("GET", "/api/instagram/posts"),
        ("DELETE", "/api/instagram/disconnect"),
        ("GET", "/api/growth/stats"),
    ];

    for (method, path) in routes {
        let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap();
        let response = server
            .client
            .request(method.clone(), server.url(path))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401, "{method} {path}");
    }
}

#[tokio::test]
async fn test_invalid_and_expired_sessions_are_rejected() {
    let server = TestServer::new().await;
    let (user, _) = server.create_test_user("creator@example.com").await;

    let expired = Session::new(user.id.clone(), user.email.clone(), -60);
    let expired = create_session_token(&expired, &server.state.config.auth.session_secret).unwrap();

    let foreign = Session::new(user.id, user.email, 3600);
    let foreign = create_session_token(&foreign, "some-other-secret-that-is-32-bytes").unwrap();

    for token in [expired.as_str(), foreign.as_str(), "garbage"] {
        let response = server
            .client
            .get(server.url("/api/instagram/posts"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);

        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_connect_returns_provider_dialog_url() {
    let server = TestServer::new().await;
    let (_, token) = server.create_test_user("creator@example.com").await;

    let response = server
        .client
        .get(server.url("/api/instagram/connect"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with(&format!("{}/dialog/oauth?", server.provider_addr)));
    assert!(url.contains("client_id=test-client-id"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("state="));
}

#[tokio::test]
async fn test_callback_rejects_forged_state() {
    let server = TestServer::new().await;
    let (user, _) = server.create_test_user("creator@example.com").await;

    let forged = create_state_token(
        &user.id,
        &user.email,
        "some-other-secret-that-is-32-bytes",
        600,
    )
    .unwrap();

    let mut callback = url::Url::parse(&server.url("/auth/instagram/callback")).unwrap();
    callback
        .query_pairs_mut()
        .append_pair("code", VALID_CODE)
        .append_pair("state", &forged);

    let response = server.client.get(callback).send().await.unwrap();
    assert_eq!(response.status(), 401);
    assert!(
        server
            .state
            .db
            .get_connected_account_by_user(&user.id)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_callback_requires_code_and_state() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/auth/instagram/callback?state=abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = server
        .client
        .get(server.url("/auth/instagram/callback?code=abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_declined_authorization_redirects_back() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url(
            "/auth/instagram/callback?error=access_denied&error_description=Permissions+error",
        ))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let location = response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert_eq!(
        location,
        "http://localhost:5173/?connected=false&error=access_denied"
    );
}
