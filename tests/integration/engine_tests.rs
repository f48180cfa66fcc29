use super::test_helpers::{bitbucket_server, last_page, repository};
use async_trait::async_trait;
use mockito::Matcher;
use serde_json::{json, Value};
use std::sync::Arc;
use vcs_bridge::cache::MemoryStore;
use vcs_bridge::config::{AuthConfig, LoaderSettings, SecretsProvider, StatusSettings};
use vcs_bridge::engine::{
    cached_repos, BuildEvent, ClientResolver, RepoCacheLoader, StaticCatalog, StatusSynchronizer,
    TickOutcome, VcsLink,
};
use vcs_bridge::vcs::{BuildStatus, Provider};
use vcs_bridge::{Result, VcsError};

/// Hands out a bearer credential for `alice` on one server
struct MockSecrets {
    base_url: String,
}

#[async_trait]
impl SecretsProvider for MockSecrets {
    async fn get_decrypted_credential(&self, link_id: &str) -> Result<AuthConfig> {
        match link_id {
            "l1" => Ok(AuthConfig::bearer("alice", "pat", &self.base_url)),
            other => Err(VcsError::config(format!("no credential for {other}"))),
        }
    }
}

fn link(id: &str, name: &str) -> VcsLink {
    VcsLink {
        id: id.to_string(),
        name: name.to_string(),
        project_key: "PRJ".to_string(),
        provider: Provider::BitbucketServer,
    }
}

fn resolver(base_url: &str) -> Arc<ClientResolver> {
    let (server, _) = bitbucket_server(base_url);
    Arc::new(
        ClientResolver::new(Arc::new(MockSecrets {
            base_url: base_url.to_string(),
        }))
        .with_server(Arc::new(server)),
    )
}

fn pull_request(id: u64, head: &str) -> Value {
    let side = |name: &str, commit: &str| {
        json!({
            "id": format!("refs/heads/{name}"),
            "displayId": name,
            "latestCommit": commit,
            "repository": repository("PRJ", "api")
        })
    };
    json!({
        "id": id,
        "title": "Feature",
        "state": "OPEN",
        "fromRef": side("feature", head),
        "toRef": side("main", "base000")
    })
}

fn event(status: BuildStatus) -> BuildEvent {
    BuildEvent {
        project_key: "PRJ".to_string(),
        workflow_name: "deploy".to_string(),
        node_name: "build".to_string(),
        run_number: 3,
        hash: "abc123".to_string(),
        status,
        repository_fullname: "PRJ/api".to_string(),
        link: link("l1", "main"),
    }
}

#[tokio::test]
async fn test_terminal_status_is_posted_and_commented() {
    let mut server = mockito::Server::new_async().await;
    let status = server
        .mock("POST", "/rest/build-status/1.0/commits/abc123")
        .match_body(Matcher::PartialJson(json!({
            "state": "SUCCESSFUL",
            "key": "PRJ-deploy-build",
            "name": "PRJ-deploy-build-3",
            "url": "https://cds.example.com/project/PRJ/workflow/deploy/run/3",
            "description": "CDS/PRJ-deploy-build: Success"
        })))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let _prs = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/pull-requests")
        .match_query(Matcher::UrlEncoded("state".into(), "OPEN".into()))
        .with_status(200)
        .with_body(last_page(vec![
            pull_request(6, "other999"),
            pull_request(7, "abc123"),
        ]))
        .create_async()
        .await;
    let _permissions = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/permissions/users")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![json!({
            "user": { "name": "alice" },
            "permission": "REPO_ADMIN"
        })]))
        .create_async()
        .await;
    let comment = server
        .mock("POST", "/rest/api/1.0/projects/PRJ/repos/api/pull-requests/7/comments")
        .match_body(Matcher::Regex("PRJ-deploy-build #3: Success".into()))
        .with_status(201)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let settings = StatusSettings {
        ui_url: "https://cds.example.com/".to_string(),
        comment_on_pull_request: true,
        ..Default::default()
    };
    let synchronizer = StatusSynchronizer::new(resolver(&server.url()), settings);
    synchronizer.process(&event(BuildStatus::Success)).await.unwrap();

    status.assert_async().await;
    comment.assert_async().await;
}

#[tokio::test]
async fn test_running_status_never_comments() {
    let mut server = mockito::Server::new_async().await;
    let status = server
        .mock("POST", "/rest/build-status/1.0/commits/abc123")
        .match_body(Matcher::PartialJson(json!({ "state": "INPROGRESS" })))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let prs = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/pull-requests")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let settings = StatusSettings {
        comment_on_pull_request: true,
        ..Default::default()
    };
    let synchronizer = StatusSynchronizer::new(resolver(&server.url()), settings);
    synchronizer.process(&event(BuildStatus::Building)).await.unwrap();

    status.assert_async().await;
    prs.assert_async().await;
}

#[tokio::test]
async fn test_loader_stores_repositories_per_link() {
    let mut server = mockito::Server::new_async().await;
    let repos = server
        .mock("GET", "/rest/api/1.0/repos")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![repository("PRJ", "api"), repository("PRJ", "web")]))
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryStore::new());
    // The second link has no credential; its failure must not stop the first
    let catalog = StaticCatalog::new(vec![link("l1", "main"), link("l2", "broken")]);
    let loader = RepoCacheLoader::new(
        store.clone(),
        Arc::new(catalog),
        resolver(&server.url()),
        &LoaderSettings::default(),
    );

    assert_eq!(loader.tick().await.unwrap(), TickOutcome::Loaded { repos: 2 });
    repos.assert_async().await;

    let cached = cached_repos(store.as_ref(), Provider::BitbucketServer, "PRJ", "main")
        .await
        .unwrap()
        .unwrap();
    let names: Vec<_> = cached.iter().map(|r| r.fullname.as_str()).collect();
    assert_eq!(names, vec!["PRJ/api", "PRJ/web"]);

    assert!(cached_repos(store.as_ref(), Provider::BitbucketServer, "PRJ", "broken")
        .await
        .unwrap()
        .is_none());
}
