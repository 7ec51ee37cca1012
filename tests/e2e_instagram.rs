//! E2E tests for the connect flow, post ingestion and disconnect

mod common;

use common::{STUB_PROVIDER_ACCOUNT_ID, STUB_USERNAME, TestServer};

#[tokio::test]
async fn test_callback_connects_and_ingests_posts() {
    let server = TestServer::new().await;
    let (user, token) = server.create_test_user("creator@example.com").await;

    let response = server.connect_account(&token).await;
    assert_eq!(response.status(), 307);
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173/?connected=true")
    );

    let account = server
        .state
        .db
        .get_connected_account_by_user(&user.id)
        .await
        .unwrap()
        .expect("account connected");
    assert_eq!(account.provider_account_id, STUB_PROVIDER_ACCOUNT_ID);
    assert_eq!(account.display_name, STUB_USERNAME);
    assert_eq!(account.access_token, "long-token");

    // Ingestion runs in the background after the redirect
    let body = server.wait_for_posts(&token, 3).await;
    assert_eq!(body["account"]["id"], account.id.as_str());
    assert_eq!(body["account"]["username"], STUB_USERNAME);

    let posts = body["posts"].as_array().unwrap();
    let ids: Vec<_> = posts
        .iter()
        .map(|p| p["provider_post_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["media-1", "media-2", "media-3"]);
    assert!(posts.iter().all(|p| p.get("access_token").is_none()));
}

#[tokio::test]
async fn test_reconnect_does_not_duplicate() {
    let server = TestServer::new().await;
    let (user, token) = server.create_test_user("creator@example.com").await;

    server.connect_account(&token).await;
    server.wait_for_posts(&token, 3).await;
    let first = server
        .state
        .db
        .get_connected_account_by_user(&user.id)
        .await
        .unwrap()
        .unwrap();

    server.connect_account(&token).await;
    let second = server
        .state
        .db
        .get_connected_account_by_user(&user.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.created_at, second.created_at);
    // Posts refresh in place
    server.wait_for_posts(&token, 3).await;
    assert_eq!(server.state.db.count_posts(&first.id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_refresh_schedules_fetch() {
    let server = TestServer::new().await;
    let (_, token) = server.create_test_user("creator@example.com").await;

    let response = server
        .client
        .post(server.url("/api/instagram/refresh"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.connect_account(&token).await;

    let response = server
        .client
        .post(server.url("/api/instagram/refresh"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "fetch scheduled");
    assert_eq!(body["account"]["username"], STUB_USERNAME);

    server.wait_for_posts(&token, 3).await;
}

#[tokio::test]
async fn test_posts_limit() {
    let server = TestServer::new().await;
    let (_, token) = server.create_test_user("creator@example.com").await;
    server.connect_account(&token).await;
    server.wait_for_posts(&token, 3).await;

    let response = server
        .client
        .get(server.url("/api/instagram/posts?limit=2"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["posts_count"], 2);
    assert_eq!(body["posts"][0]["provider_post_id"], "media-1");
}

#[tokio::test]
async fn test_disconnect_removes_account_and_posts() {
    let server = TestServer::new().await;
    let (user, token) = server.create_test_user("creator@example.com").await;
    server.connect_account(&token).await;
    server.wait_for_posts(&token, 3).await;
    let account = server
        .state
        .db
        .get_connected_account_by_user(&user.id)
        .await
        .unwrap()
        .unwrap();

    let response = server
        .client
        .delete(server.url("/api/instagram/disconnect"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["account"]["id"], account.id.as_str());

    assert_eq!(server.state.db.count_posts(&account.id).await.unwrap(), 0);

    let response = server
        .client
        .get(server.url("/api/instagram/posts"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = server
        .client
        .delete(server.url("/api/instagram/disconnect"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
