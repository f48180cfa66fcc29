use super::test_helpers::{authorized_client, branch, last_page, repository};
use bytes::Bytes;
use mockito::Matcher;
use serde_json::json;
use vcs_bridge::vcs::{
    BuildStatus, CommitState, VcsAuthorizedClient, VcsBranchFilters, VcsBranchesFilter,
    VcsBuildStatus,
};
use vcs_bridge::ErrorKind;

#[tokio::test]
async fn test_malformed_fullname_never_reaches_the_server() {
    let mut server = mockito::Server::new_async().await;
    let any = server
        .mock("GET", Matcher::Any)
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    for fullname in ["api", "PRJ/api/extra", "/api", "PRJ/"] {
        let err = client.repo_by_fullname(fullname).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RepoNotFound, "{fullname}");
        let err = client
            .branches(fullname, VcsBranchesFilter::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RepoNotFound, "{fullname}");
    }

    any.assert_async().await;
}

#[tokio::test]
async fn test_repos_are_projected_with_url_templates() {
    let mut server = mockito::Server::new_async().await;
    let _repos = server
        .mock("GET", "/rest/api/1.0/repos")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![repository("PRJ", "api"), repository("OPS", "infra")]))
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let repos = client.repos().await.unwrap();

    assert_eq!(repos.len(), 2);
    assert_eq!(repos[0].fullname, "PRJ/api");
    assert_eq!(repos[1].http_clone_url, "https://bb/scm/ops/infra.git");
    assert_eq!(
        repos[0].commit_url("abc"),
        format!("{}/projects/PRJ/repos/api/commits/abc", server.url())
    );
    assert_eq!(
        repos[0].branch_url("main"),
        format!("{}/projects/PRJ/repos/api/browse?at=refs%2Fheads%2Fmain", server.url())
    );
}

#[tokio::test]
async fn test_default_branch_is_flagged_without_duplicates() {
    let mut server = mockito::Server::new_async().await;
    let _branches = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/branches")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![
            branch("main", "c1", false),
            branch("feature", "c2", false),
        ]))
        .create_async()
        .await;
    let default = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/branches/default")
        .with_status(200)
        .with_body(branch("main", "c1", true).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let branches = client
        .branches("PRJ/api", VcsBranchesFilter::default())
        .await
        .unwrap();

    assert_eq!(branches.len(), 2);
    let defaults: Vec<_> = branches.iter().filter(|b| b.default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].display_id, "main");
    default.assert_async().await;
}

#[tokio::test]
async fn test_default_branch_outside_the_listing_is_appended() {
    let mut server = mockito::Server::new_async().await;
    let _branches = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/branches")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![branch("feature", "c2", false)]))
        .create_async()
        .await;
    let _default = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/branches/default")
        .with_status(200)
        .with_body(branch("main", "c1", true).to_string())
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let branches = client
        .branches("PRJ/api", VcsBranchesFilter::default())
        .await
        .unwrap();

    assert_eq!(branches.len(), 2);
    assert!(branches[1].default);
    assert_eq!(branches[1].id, "refs/heads/main");
}

#[tokio::test]
async fn test_branch_lookup_requires_exact_name() {
    let mut server = mockito::Server::new_async().await;
    let _search = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/branches")
        .match_query(Matcher::UrlEncoded("filterText".into(), "feat".into()))
        .with_status(200)
        .with_body(last_page(vec![branch("feature", "c2", false)]))
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let err = client
        .branch("PRJ/api", VcsBranchFilters::named("refs/heads/feat"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoBranch);
}

#[tokio::test]
async fn test_statuses_are_filtered_by_prefix() {
    let mut server = mockito::Server::new_async().await;
    let _statuses = server
        .mock("GET", "/rest/build-status/1.0/commits/abc123")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![
            json!({
                "state": "SUCCESSFUL",
                "key": "PRJ-deploy-build",
                "name": "PRJ-deploy-build-3",
                "url": "https://cds/run/3",
                "description": "CDS/build",
                "dateAdded": 1700000000000i64
            }),
            json!({
                "state": "FAILED",
                "key": "lint",
                "description": "other-tool/x",
                "dateAdded": 1700000000000i64
            }),
        ]))
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let statuses = client.list_statuses("PRJ/api", "abc123").await.unwrap();

    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].state, CommitState::Successful);
    assert_eq!(statuses[0].decoded_state, BuildStatus::Success);
    assert_eq!(statuses[0].ref_, "abc123");
}

#[tokio::test]
async fn test_set_status_posts_mapped_state() {
    let mut server = mockito::Server::new_async().await;
    let post = server
        .mock("POST", "/rest/build-status/1.0/commits/abc123")
        .match_body(Matcher::PartialJson(json!({
            "state": "INPROGRESS",
            "key": "PRJ-deploy-build",
            "name": "PRJ-deploy-build-3",
            "description": "CDS/PRJ-deploy-build: Building"
        })))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let status = VcsBuildStatus {
        title: "PRJ-deploy-build-3".to_string(),
        description: "CDS/PRJ-deploy-build: Building".to_string(),
        url_cds: "https://cds/run/3".to_string(),
        context: "PRJ-deploy-build".to_string(),
        status: "Building".to_string(),
        repository_fullname: "PRJ/api".to_string(),
        git_hash: "abc123".to_string(),
    };
    client.set_status(&status).await.unwrap();
    post.assert_async().await;

    let missing_hash = VcsBuildStatus {
        git_hash: String::new(),
        ..status
    };
    assert_eq!(
        client.set_status(&missing_hash).await.unwrap_err().kind(),
        ErrorKind::WrongRequest
    );
}

#[tokio::test]
async fn test_releases_are_not_implemented() {
    let client = authorized_client("http://127.0.0.1:9");

    let err = client
        .release("PRJ/api", "v1", "v1", "first")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);

    let err = client
        .upload_release_file("PRJ/api", "v1", "", "app.tgz", Bytes::from_static(b"data"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
}

#[tokio::test]
async fn test_commit_authors_are_enriched_once() {
    let mut server = mockito::Server::new_async().await;
    let _commit = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/commits/abc")
        .with_status(200)
        .with_body(
            json!({
                "id": "abc",
                "author": { "name": "alice", "emailAddress": "alice@example.com" },
                "authorTimestamp": 1700000000000i64,
                "message": "Fix"
            })
            .to_string(),
        )
        .create_async()
        .await;
    let users = server
        .mock("GET", "/rest/api/1.0/users")
        .match_query(Matcher::UrlEncoded("filter".into(), "alice@example.com".into()))
        .with_status(200)
        .with_body(last_page(vec![json!({
            "id": 101,
            "name": "alice",
            "emailAddress": "alice@example.com",
            "displayName": "Alice Liddell",
            "slug": "alice"
        })]))
        .expect(1)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    for _ in 0..2 {
        let commit = client.commit("PRJ/api", "abc").await.unwrap();
        assert_eq!(commit.author.display_name, "Alice Liddell");
        assert_eq!(commit.author.id.as_deref(), Some("101"));
        assert_eq!(
            commit.author.avatar,
            Some(format!("{}/users/alice/avatar.png", server.url()))
        );
    }
    users.assert_async().await;
}

#[tokio::test]
async fn test_pull_request_comment_grants_write_first() {
    let mut server = mockito::Server::new_async().await;
    let permissions_path = "/rest/api/1.0/projects/PRJ/repos/api/permissions/users";
    let _lookup = server
        .mock("GET", permissions_path)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![json!({
            "user": { "name": "alice", "slug": "alice" },
            "permission": "REPO_READ"
        })]))
        .create_async()
        .await;
    let grant = server
        .mock("PUT", permissions_path)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("permission".into(), "REPO_WRITE".into()),
            Matcher::UrlEncoded("name".into(), "alice".into()),
        ]))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let comment = server
        .mock("POST", "/rest/api/1.0/projects/PRJ/repos/api/pull-requests/7/comments")
        .match_body(Matcher::Json(json!({ "text": "Build passed" })))
        .with_status(201)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    client
        .pull_request_comment(
            "PRJ/api",
            vcs_bridge::vcs::VcsPullRequestCommentRequest {
                id: 7,
                message: "Build passed".to_string(),
            },
        )
        .await
        .unwrap();

    grant.assert_async().await;
    comment.assert_async().await;
}

#[tokio::test]
async fn test_status_on_unknown_commit_is_dropped() {
    let mut server = mockito::Server::new_async().await;
    let post = server
        .mock("POST", "/rest/build-status/1.0/commits/abc123")
        .with_status(404)
        .with_body(r#"{"errors":[{"message":"No such commit"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let status = VcsBuildStatus {
        title: "PRJ-deploy-build-4".to_string(),
        description: "CDS/PRJ-deploy-build: Success".to_string(),
        url_cds: "https://cds/run/4".to_string(),
        context: "PRJ-deploy-build".to_string(),
        status: "Success".to_string(),
        repository_fullname: "PRJ/api".to_string(),
        git_hash: "abc123".to_string(),
    };
    client.set_status(&status).await.unwrap();
    post.assert_async().await;
}

#[tokio::test]
async fn test_commit_author_lookup_failure_is_retried() {
    let mut server = mockito::Server::new_async().await;
    let _commit = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/commits/abc")
        .with_status(200)
        .with_body(
            json!({
                "id": "abc",
                "author": { "name": "bob", "emailAddress": "bob@example.com" },
                "authorTimestamp": 1700000000000i64,
                "message": "Fix"
            })
            .to_string(),
        )
        .create_async()
        .await;
    let users = server
        .mock("GET", "/rest/api/1.0/users")
        .match_query(Matcher::UrlEncoded("filter".into(), "bob@example.com".into()))
        .with_status(500)
        .expect(2)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    for _ in 0..2 {
        let commit = client.commit("PRJ/api", "abc").await.unwrap();
        assert_eq!(commit.author.display_name, "bob");
        assert_eq!(commit.author.avatar, None);
        assert_eq!(commit.author.slug, None);
    }
    users.assert_async().await;
}

#[tokio::test]
async fn test_denied_write_grant_blocks_pull_request_writes() {
    let mut server = mockito::Server::new_async().await;
    let permissions_path = "/rest/api/1.0/projects/PRJ/repos/api/permissions/users";
    let _lookup = server
        .mock("GET", permissions_path)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(last_page(vec![json!({
            "user": { "name": "alice", "slug": "alice" },
            "permission": "REPO_READ"
        })]))
        .create_async()
        .await;
    let grant = server
        .mock("PUT", permissions_path)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("permission".into(), "REPO_WRITE".into()),
            Matcher::UrlEncoded("name".into(), "alice".into()),
        ]))
        .with_status(403)
        .with_body(r#"{"errors":[{"message":"You are not permitted"}]}"#)
        .expect(2)
        .create_async()
        .await;
    let comment = server
        .mock("POST", "/rest/api/1.0/projects/PRJ/repos/api/pull-requests/7/comments")
        .expect(0)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/rest/api/1.0/projects/PRJ/repos/api/pull-requests")
        .expect(0)
        .create_async()
        .await;

    let client = authorized_client(&server.url());
    let err = client
        .pull_request_comment(
            "PRJ/api",
            vcs_bridge::vcs::VcsPullRequestCommentRequest {
                id: 7,
                message: "Build passed".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let mut pr = vcs_bridge::vcs::VcsPullRequest {
        title: "Bump deps".to_string(),
        ..Default::default()
    };
    pr.head.branch.display_id = "feature/deps".to_string();
    pr.base.branch.display_id = "master".to_string();
    let err = client.pull_request_create("PRJ/api", pr).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    grant.assert_async().await;
    comment.assert_async().await;
    create.assert_async().await;
}
