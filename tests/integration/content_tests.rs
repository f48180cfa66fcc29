use super::test_helpers::bitbucket_server;
use mockito::Matcher;
use serde_json::json;
use vcs_bridge::config::AuthConfig;
use vcs_bridge::vcs::{VcsAuthorizedClient, VcsContent};

#[tokio::test]
async fn test_archive_is_streamed_without_caching() {
    let mut server = mockito::Server::new_async().await;
    let archive = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/archive")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("format".into(), "zip".into()),
            Matcher::UrlEncoded("at".into(), "abc".into()),
            Matcher::UrlEncoded("path".into(), "src".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/zip")
        .with_header("content-disposition", "attachment; filename=api.zip")
        .with_body(b"PK\x03\x04archive".to_vec())
        .expect(1)
        .create_async()
        .await;

    let (bitbucket, store) = bitbucket_server(&server.url());
    let client = bitbucket
        .authorized_client(&AuthConfig::bearer("alice", "pat", &server.url()))
        .unwrap();

    let stream = client.get_archive("PRJ/api", "/src/", "zip", "abc").await.unwrap();
    assert_eq!(
        stream.headers.get("content-type").unwrap(),
        "application/zip"
    );
    assert_eq!(
        stream.headers.get("content-disposition").unwrap(),
        "attachment; filename=api.zip"
    );
    assert_eq!(stream.into_bytes().await.unwrap(), b"PK\x03\x04archive".to_vec());

    assert!(store.is_empty());
    archive.assert_async().await;
}

#[tokio::test]
async fn test_content_listing_is_paged_and_flattened() {
    let mut server = mockito::Server::new_async().await;
    let path = "/rest/api/1.0/projects/PRJ/repos/api/files/src";
    let first = server
        .mock("GET", path)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("at".into(), "abc".into()),
            Matcher::UrlEncoded("limit".into(), "2".into()),
            Matcher::UrlEncoded("start".into(), "0".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "start": 0,
                "isLastPage": false,
                "nextPageStart": 2,
                "values": ["main.rs", "cli/mod.rs"]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", path)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("at".into(), "abc".into()),
            Matcher::UrlEncoded("limit".into(), "2".into()),
            Matcher::UrlEncoded("start".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "start": 2,
                "isLastPage": true,
                "values": ["cli/output.rs"]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let (bitbucket, _) = bitbucket_server(&server.url());
    let client = bitbucket
        .with_page_size(2)
        .authorized_client(&AuthConfig::bearer("alice", "pat", &server.url()))
        .unwrap();

    let contents = client.list_content("PRJ/api", "abc", "src").await.unwrap();
    let listed: Vec<(&str, bool)> = contents
        .iter()
        .map(|c| (c.name.as_str(), c.is_directory))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("main.rs", false),
            ("cli", true),
            ("cli/mod.rs", false),
            ("cli/output.rs", false),
        ]
    );
    assert!(contents.iter().all(|c| c.content.is_none()));

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_file_content_is_downloaded() {
    let mut server = mockito::Server::new_async().await;
    let browse = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/browse/docs/README.md")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("at".into(), "abc".into()),
            Matcher::UrlEncoded("type".into(), "true".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"type":"FILE"}"#)
        .expect(1)
        .create_async()
        .await;
    let raw = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/raw/docs/README.md")
        .match_query(Matcher::UrlEncoded("at".into(), "abc".into()))
        .with_status(200)
        .with_body("# api\n")
        .expect(1)
        .create_async()
        .await;

    let (bitbucket, _) = bitbucket_server(&server.url());
    let client = bitbucket
        .authorized_client(&AuthConfig::bearer("alice", "pat", &server.url()))
        .unwrap();

    let content = client.get_content("PRJ/api", "abc", "docs/README.md").await.unwrap();
    assert_eq!(
        content,
        VcsContent {
            name: "docs/README.md".to_string(),
            is_directory: false,
            is_file: true,
            content: Some("# api\n".to_string()),
        }
    );

    browse.assert_async().await;
    raw.assert_async().await;
}

#[tokio::test]
async fn test_directory_content_has_no_body() {
    let mut server = mockito::Server::new_async().await;
    let browse = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/browse/docs")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("at".into(), "abc".into()),
            Matcher::UrlEncoded("type".into(), "true".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"type":"DIRECTORY"}"#)
        .expect(1)
        .create_async()
        .await;
    let raw = server
        .mock("GET", "/rest/api/1.0/projects/PRJ/repos/api/raw/docs")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (bitbucket, _) = bitbucket_server(&server.url());
    let client = bitbucket
        .authorized_client(&AuthConfig::bearer("alice", "pat", &server.url()))
        .unwrap();

    let content = client.get_content("PRJ/api", "abc", "docs/").await.unwrap();
    assert_eq!(content.name, "docs");
    assert!(content.is_directory);
    assert!(!content.is_file);
    assert_eq!(content.content, None);

    browse.assert_async().await;
    raw.assert_async().await;
}
