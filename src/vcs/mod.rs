//! Provider-agnostic VCS contract
//!
//! [`VcsAuthorizedClient`] is the only surface the rest of the engine may depend on.
//! Each provider implements it; [`VcsServer`] turns stored credentials into one.

pub mod factory;
pub mod status;
pub mod types;

pub use factory::{Provider, VcsServerFactory};
pub use status::BuildStatus;
pub use types::*;

use crate::config::{AuthConfig, OAuthToken};
use crate::errors::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::HeaderMap;

/// Raw response body plus headers, used for archives and file downloads
pub struct VcsStream {
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl VcsStream {
    /// Drain the body into memory
    pub async fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf)
    }
}

impl std::fmt::Debug for VcsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcsStream")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Per-provider factory of authorized clients. Owns the OAuth1 flow.
#[async_trait]
pub trait VcsServer: Send + Sync {
    fn provider(&self) -> Provider;

    /// Obtain a request token and the URL the user must visit to approve it
    async fn authorize_redirect(&self) -> Result<(OAuthToken, String)>;

    /// Exchange an approved request token and its verifier for an access token
    async fn authorize_token(&self, request_token: &OAuthToken, verifier: &str) -> Result<OAuthToken>;

    /// Wrap a credential into a client. Never touches the network.
    fn get_authorized_client(&self, auth: &AuthConfig) -> Result<Box<dyn VcsAuthorizedClient>>;
}

/// Main trait defining operations on a connected VCS account
#[async_trait]
pub trait VcsAuthorizedClient: Send + Sync {
    fn provider(&self) -> Provider;

    // Repositories
    async fn repos(&self) -> Result<Vec<VcsRepo>>;
    async fn repo_by_fullname(&self, fullname: &str) -> Result<VcsRepo>;

    // Branches
    async fn branches(&self, repo: &str, filter: VcsBranchesFilter) -> Result<Vec<VcsBranch>>;
    async fn branch(&self, repo: &str, filters: VcsBranchFilters) -> Result<VcsBranch>;

    // Tags
    async fn tags(&self, repo: &str) -> Result<Vec<VcsTag>>;
    async fn tag(&self, repo: &str, tag_name: &str) -> Result<VcsTag>;

    // Commits
    async fn commits(&self, repo: &str, branch: &str, since: &str, until: &str) -> Result<Vec<VcsCommit>>;
    async fn commit(&self, repo: &str, hash: &str) -> Result<VcsCommit>;
    async fn commits_between_refs(&self, repo: &str, base: &str, head: &str) -> Result<Vec<VcsCommit>>;

    // Pull requests
    async fn pull_request(&self, repo: &str, id: u64) -> Result<VcsPullRequest>;
    async fn pull_requests(&self, repo: &str, state: VcsPullRequestState) -> Result<Vec<VcsPullRequest>>;
    async fn pull_request_comment(&self, repo: &str, comment: VcsPullRequestCommentRequest) -> Result<()>;
    async fn pull_request_create(&self, repo: &str, pr: VcsPullRequest) -> Result<VcsPullRequest>;
    async fn search_pull_request(
        &self,
        repo: &str,
        commit: &str,
        state: VcsPullRequestState,
    ) -> Result<Option<VcsPullRequest>>;

    // Hooks
    async fn create_hook(&self, repo: &str, hook: &mut VcsHook) -> Result<()>;
    async fn update_hook(&self, repo: &str, hook: &VcsHook) -> Result<()>;
    async fn get_hook(&self, repo: &str, url: &str) -> Result<VcsHook>;
    async fn delete_hook(&self, repo: &str, hook: &VcsHook) -> Result<()>;

    // Commit statuses
    async fn set_status(&self, status: &VcsBuildStatus) -> Result<()>;
    async fn list_statuses(&self, repo: &str, git_ref: &str) -> Result<Vec<VcsCommitStatus>>;

    // Releases
    async fn release(&self, repo: &str, tag_name: &str, title: &str, description: &str) -> Result<VcsRelease>;
    async fn upload_release_file(
        &self,
        repo: &str,
        release_name: &str,
        upload_url: &str,
        artifact_name: &str,
        content: Bytes,
    ) -> Result<()>;

    // Forks
    async fn list_forks(&self, repo: &str) -> Result<Vec<VcsRepo>>;

    // Files
    async fn get_archive(&self, repo: &str, dir: &str, format: &str, commit: &str) -> Result<VcsStream>;
    async fn list_content(&self, repo: &str, commit: &str, dir: &str) -> Result<Vec<VcsContent>>;
    async fn get_content(&self, repo: &str, commit: &str, path: &str) -> Result<VcsContent>;

    // Insights
    async fn create_insight_report(&self, repo: &str, commit: &str, key: &str, report: &VcsInsight) -> Result<()>;

    /// Make sure the acting user may write to `repo`, escalating if needed
    async fn grant_write_permission(&self, repo: &str) -> Result<()>;
}
