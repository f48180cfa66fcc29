use super::test_helpers::transport;
use mockito::Matcher;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use vcs_bridge::bitbucket::ApiFamily;
use vcs_bridge::cache::{CacheStore, MemoryStore};
use vcs_bridge::ErrorKind;

/// A write to a URL evicts the cached read of that URL and nothing else
#[tokio::test]
async fn test_write_invalidates_only_its_own_key() {
    let mut server = mockito::Server::new_async().await;
    let store = Arc::new(MemoryStore::new());
    let client = transport(&server.url(), store.clone());

    let repo_get = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "slug": "api" }).to_string())
        .expect(2)
        .create_async()
        .await;
    let other_get = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/other")
        .with_status(200)
        .with_body(json!({ "slug": "other" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let repo_put = server
        .mock("PUT", "/rest/api/1.0/projects/PRJ/repos/api")
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    for _ in 0..2 {
        let _: Value = client
            .get(ApiFamily::Core, "projects/PRJ/repos/api", &[])
            .await
            .unwrap();
        let _: Value = client
            .get(ApiFamily::Core, "projects/PRJ/repos/other", &[])
            .await
            .unwrap();
    }

    client
        .put_empty(ApiFamily::Core, "projects/PRJ/repos/api", &[])
        .await
        .unwrap();

    let repo: Value = client
        .get(ApiFamily::Core, "projects/PRJ/repos/api", &[])
        .await
        .unwrap();
    assert_eq!(repo["slug"], "api");
    let _: Value = client
        .get(ApiFamily::Core, "projects/PRJ/repos/other", &[])
        .await
        .unwrap();

    repo_get.assert_async().await;
    other_get.assert_async().await;
    repo_put.assert_async().await;
}

/// Fresh reads skip the cache but still refresh it
#[tokio::test]
async fn test_fresh_reads_bypass_the_cache() {
    let mut server = mockito::Server::new_async().await;
    let client = transport(&server.url(), Arc::new(MemoryStore::new()));

    let mock = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/webhooks/1")
        .with_status(200)
        .with_body(json!({ "id": 1, "url": "https://cds/hook" }).to_string())
        .expect(2)
        .create_async()
        .await;

    let path = "projects/PRJ/repos/api/webhooks/1";
    let _: Value = client.get(ApiFamily::Core, path, &[]).await.unwrap();
    let _: Value = client.get_fresh(ApiFamily::Core, path, &[]).await.unwrap();
    let _: Value = client.get(ApiFamily::Core, path, &[]).await.unwrap();

    mock.assert_async().await;
}

/// Cache entries are scoped to the acting user
#[tokio::test]
async fn test_cache_is_shared_per_user_only() {
    let mut server = mockito::Server::new_async().await;
    let store = Arc::new(MemoryStore::new());
    let alice = transport(&server.url(), store.clone());
    let anonymous = vcs_bridge::bitbucket::BitbucketClient::new(
        reqwest::Client::new(),
        &server.url(),
        vcs_bridge::config::Credential::Bearer {
            username: None,
            token: "other-token".to_string(),
        },
        store.clone(),
    );

    let mock = server
        .mock("GET", "/rest/api/1.0/repos")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "values": [] }).to_string())
        .expect(2)
        .create_async()
        .await;

    let _: Value = alice.get(ApiFamily::Core, "repos", &[]).await.unwrap();
    let _: Value = alice.get(ApiFamily::Core, "repos", &[]).await.unwrap();
    let _: Value = anonymous.get(ApiFamily::Core, "repos", &[]).await.unwrap();

    mock.assert_async().await;
}

/// Responses expire with the configured TTL
#[tokio::test]
async fn test_cache_ttl_is_applied() {
    let mut server = mockito::Server::new_async().await;
    let store = Arc::new(MemoryStore::new());
    let client = transport(&server.url(), store.clone()).with_cache_ttl(Some(Duration::from_millis(50)));

    let mock = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api")
        .with_status(200)
        .with_body(json!({ "slug": "api" }).to_string())
        .expect(2)
        .create_async()
        .await;

    let _: Value = client.get(ApiFamily::Core, "projects/PRJ/repos/api", &[]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    let _: Value = client.get(ApiFamily::Core, "projects/PRJ/repos/api", &[]).await.unwrap();

    mock.assert_async().await;
}

/// Error statuses map onto the error taxonomy and are never cached
#[tokio::test]
async fn test_error_statuses_are_classified() {
    let mut server = mockito::Server::new_async().await;
    let store = Arc::new(MemoryStore::new());
    let client = transport(&server.url(), store.clone());

    let cases = [
        ("/rest/api/1.0/missing", 404, ErrorKind::NotFound),
        ("/rest/api/1.0/forbidden", 403, ErrorKind::Forbidden),
        ("/rest/api/1.0/unauthorized", 401, ErrorKind::Unauthorized),
        ("/rest/api/1.0/bad", 400, ErrorKind::WrongRequest),
        ("/rest/api/1.0/broken", 500, ErrorKind::Transport),
    ];

    for (path, status, kind) in cases {
        let _mock = server
            .mock("GET", path)
            .with_status(status)
            .with_body("{\"errors\":[]}")
            .create_async()
            .await;

        let err = client
            .get::<Value>(ApiFamily::Core, path.trim_start_matches("/rest/api/1.0/"), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "status {status}");
    }

    let missing_key = format!(
        "vcs:bitbucketserver:request:{}/rest/api/1.0/missing:alice",
        server.url()
    );
    assert!(store.get(&missing_key).await.unwrap().is_none());
}
