use serde_json::{json, Value};
use std::sync::Arc;
use vcs_bridge::bitbucket::{BitbucketAuthorizedClient, BitbucketClient, BitbucketServer};
use vcs_bridge::cache::MemoryStore;
use vcs_bridge::config::{AuthConfig, Credential};

/// Bitbucket server facade pointed at a mock, with a fresh in-memory cache
pub fn bitbucket_server(base_url: &str) -> (BitbucketServer, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let server = BitbucketServer::new(base_url, reqwest::Client::new(), store.clone());
    (server, store)
}

/// Authorized client for user `alice` with a bearer token
pub fn authorized_client(base_url: &str) -> BitbucketAuthorizedClient {
    let (server, _) = bitbucket_server(base_url);
    server
        .authorized_client(&AuthConfig::bearer("alice", "pat", base_url))
        .unwrap()
}

/// Raw transport for user `alice`, sharing `store`
pub fn transport(base_url: &str, store: Arc<MemoryStore>) -> BitbucketClient {
    BitbucketClient::new(
        reqwest::Client::new(),
        base_url,
        Credential::Bearer {
            username: Some("alice".to_string()),
            token: "pat".to_string(),
        },
        store,
    )
}

/// Single page listing body
pub fn last_page(values: Vec<Value>) -> String {
    json!({
        "size": values.len(),
        "start": 0,
        "isLastPage": true,
        "values": values
    })
    .to_string()
}

pub fn repository(project: &str, slug: &str) -> Value {
    json!({
        "id": 1,
        "slug": slug,
        "name": slug,
        "project": { "id": 1, "key": project, "name": project },
        "links": {
            "clone": [
                { "href": format!("https://bb/scm/{}/{slug}.git", project.to_lowercase()), "name": "http" }
            ]
        }
    })
}

pub fn branch(name: &str, commit: &str, is_default: bool) -> Value {
    json!({
        "id": format!("refs/heads/{name}"),
        "displayId": name,
        "latestCommit": commit,
        "isDefault": is_default
    })
}
