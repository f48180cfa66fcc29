use super::test_helpers::{authorized_client, last_page};
use mockito::Matcher;
use serde_json::json;
use vcs_bridge::vcs::{VcsAuthorizedClient, VcsHook};
use vcs_bridge::ErrorKind;

const HOOKS_PATH: &str = "/rest/api/1.0/projects/PRJ/repos/api/webhooks";

fn hook(url: &str) -> VcsHook {
    VcsHook {
        url: url.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_hook_is_idempotent_on_url() {
    let mut server = mockito::Server::new_async().await;
    let listing = server
        .mock("GET", HOOKS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![json!({
            "id": 17,
            "name": "cds",
            "url": "https://cds/hook",
            "events": ["repo:refs_changed"],
            "active": true
        })]))
        .expect(2)
        .create_async()
        .await;
    let create = server
        .mock("POST", HOOKS_PATH)
        .with_status(201)
        .expect(0)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    for _ in 0..2 {
        let mut hook = hook("https://cds/hook");
        client.create_hook("PRJ/api", &mut hook).await.unwrap();
        assert_eq!(hook.id, "17");
    }

    listing.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn test_create_hook_posts_defaults_and_writes_back_id() {
    let mut server = mockito::Server::new_async().await;
    let _listing = server
        .mock("GET", HOOKS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![]))
        .create_async()
        .await;
    let create = server
        .mock("POST", HOOKS_PATH)
        .match_body(Matcher::PartialJson(json!({
            "name": "cds",
            "url": "https://cds/hook",
            "events": ["repo:refs_changed"],
            "active": true
        })))
        .with_status(201)
        .with_body(
            json!({
                "id": 42,
                "name": "cds",
                "url": "https://cds/hook",
                "events": ["repo:refs_changed"],
                "active": true
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let mut hook = hook("https://cds/hook");
    client.create_hook("PRJ/api", &mut hook).await.unwrap();

    assert_eq!(hook.id, "42");
    assert!(hook.enabled);
    assert_eq!(hook.events, vec!["repo:refs_changed"]);
    create.assert_async().await;
}

#[tokio::test]
async fn test_get_hook_by_url() {
    let mut server = mockito::Server::new_async().await;
    let _listing = server
        .mock("GET", HOOKS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![json!({ "id": 3, "url": "https://cds/a" })]))
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    assert_eq!(client.get_hook("PRJ/api", "https://cds/a").await.unwrap().id, "3");

    let missing = client.get_hook("PRJ/api", "https://cds/b").await.unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::HookNotFound);
}

#[tokio::test]
async fn test_update_hook_only_replaces_events() {
    let mut server = mockito::Server::new_async().await;
    let path = format!("{HOOKS_PATH}/5");
    let _current = server
        .mock("GET", path.as_str())
        .with_status(200)
        .with_body(
            json!({
                "id": 5,
                "name": "custom",
                "url": "https://cds/hook",
                "events": ["repo:refs_changed"],
                "active": true,
                "configuration": { "secret": "s3" }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let update = server
        .mock("PUT", path.as_str())
        .match_body(Matcher::PartialJson(json!({
            "name": "custom",
            "events": ["repo:refs_changed", "pr:merged"],
            "configuration": { "secret": "s3" }
        })))
        .with_status(200)
        .with_body(json!({ "id": 5, "url": "https://cds/hook" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let hook = VcsHook {
        id: "5".to_string(),
        url: "https://cds/hook".to_string(),
        events: vec!["repo:refs_changed".to_string(), "pr:merged".to_string()],
        ..Default::default()
    };
    client.update_hook("PRJ/api", &hook).await.unwrap();
    update.assert_async().await;
}

#[tokio::test]
async fn test_delete_hook_tolerates_missing_hook() {
    let mut server = mockito::Server::new_async().await;
    let delete = server
        .mock("DELETE", format!("{HOOKS_PATH}/9").as_str())
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let mut hook = hook("https://cds/hook");
    hook.id = "9".to_string();
    client.delete_hook("PRJ/api", &hook).await.unwrap();
    delete.assert_async().await;

    hook.id.clear();
    let err = client.delete_hook("PRJ/api", &hook).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WrongRequest);
}
