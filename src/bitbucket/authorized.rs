use super::client::{segment, BitbucketClient};
use crate::errors::{Result, VcsError};
use crate::vcs::*;
use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// [`VcsAuthorizedClient`] for one Bitbucket Server credential
///
/// The operations live next to the REST family they use: repositories and
/// content in `repos.rs`, pull requests in `pull_request.rs`, webhooks in
/// `hooks.rs`, statuses and insights in `status.rs`.
#[derive(Clone)]
pub struct BitbucketAuthorizedClient {
    pub(crate) client: BitbucketClient,
    pub(crate) status_prefix: String,
}

impl BitbucketAuthorizedClient {
    pub fn new(client: BitbucketClient, status_prefix: impl Into<String>) -> Self {
        Self {
            client,
            status_prefix: status_prefix.into(),
        }
    }

    /// Tie every call made by this client to `cancel`
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.client = self.client.with_cancellation(cancel);
        self
    }

    pub fn transport(&self) -> &BitbucketClient {
        &self.client
    }
}

/// Split `<project>/<slug>`; any other shape is `RepoNotFound`
pub(crate) fn split_fullname(fullname: &str) -> Result<(&str, &str)> {
    match fullname.split('/').collect::<Vec<_>>().as_slice() {
        [project, slug] if !project.is_empty() && !slug.is_empty() => Ok((*project, *slug)),
        _ => Err(VcsError::repo_not_found(format!(
            "'{fullname}' is not a <project>/<slug> fullname"
        ))),
    }
}

/// `projects/{project}/repos/{slug}` for a validated fullname
pub(crate) fn repo_path(fullname: &str) -> Result<String> {
    let (project, slug) = split_fullname(fullname)?;
    Ok(format!(
        "projects/{}/repos/{}",
        segment(project),
        segment(slug)
    ))
}

#[async_trait]
impl VcsAuthorizedClient for BitbucketAuthorizedClient {
    fn provider(&self) -> Provider {
        Provider::BitbucketServer
    }

    async fn repos(&self) -> Result<Vec<VcsRepo>> {
        self.list_repos().await
    }

    async fn repo_by_fullname(&self, fullname: &str) -> Result<VcsRepo> {
        self.find_repo(fullname).await
    }

    async fn branches(&self, repo: &str, filter: VcsBranchesFilter) -> Result<Vec<VcsBranch>> {
        self.list_branches(repo, filter).await
    }

    async fn branch(&self, repo: &str, filters: VcsBranchFilters) -> Result<VcsBranch> {
        self.find_branch(repo, filters).await
    }

    async fn tags(&self, repo: &str) -> Result<Vec<VcsTag>> {
        self.list_tags(repo).await
    }

    async fn tag(&self, repo: &str, tag_name: &str) -> Result<VcsTag> {
        self.find_tag(repo, tag_name).await
    }

    async fn commits(&self, repo: &str, branch: &str, since: &str, until: &str) -> Result<Vec<VcsCommit>> {
        let until = if until.is_empty() { branch } else { until };
        self.list_commits(repo, since, until).await
    }

    async fn commit(&self, repo: &str, hash: &str) -> Result<VcsCommit> {
        self.find_commit(repo, hash).await
    }

    async fn commits_between_refs(&self, repo: &str, base: &str, head: &str) -> Result<Vec<VcsCommit>> {
        self.list_commits(repo, base, head).await
    }

    async fn pull_request(&self, repo: &str, id: u64) -> Result<VcsPullRequest> {
        self.find_pull_request(repo, id).await
    }

    async fn pull_requests(&self, repo: &str, state: VcsPullRequestState) -> Result<Vec<VcsPullRequest>> {
        self.list_pull_requests(repo, state).await
    }

    async fn pull_request_comment(&self, repo: &str, comment: VcsPullRequestCommentRequest) -> Result<()> {
        self.comment_pull_request(repo, comment).await
    }

    async fn pull_request_create(&self, repo: &str, pr: VcsPullRequest) -> Result<VcsPullRequest> {
        self.create_pull_request(repo, pr).await
    }

    async fn search_pull_request(
        &self,
        repo: &str,
        commit: &str,
        state: VcsPullRequestState,
    ) -> Result<Option<VcsPullRequest>> {
        let prs = self.list_pull_requests(repo, state).await?;
        Ok(prs.into_iter().find(|pr| pr.head.commit.hash == commit))
    }

    async fn create_hook(&self, repo: &str, hook: &mut VcsHook) -> Result<()> {
        self.register_hook(repo, hook).await
    }

    async fn update_hook(&self, repo: &str, hook: &VcsHook) -> Result<()> {
        self.overlay_hook_events(repo, hook).await
    }

    async fn get_hook(&self, repo: &str, url: &str) -> Result<VcsHook> {
        self.find_hook(repo, url).await
    }

    async fn delete_hook(&self, repo: &str, hook: &VcsHook) -> Result<()> {
        self.remove_hook(repo, hook).await
    }

    async fn set_status(&self, status: &VcsBuildStatus) -> Result<()> {
        self.post_status(status).await
    }

    async fn list_statuses(&self, repo: &str, git_ref: &str) -> Result<Vec<VcsCommitStatus>> {
        self.own_statuses(repo, git_ref).await
    }

    async fn release(&self, _repo: &str, _tag_name: &str, _title: &str, _description: &str) -> Result<VcsRelease> {
        Err(VcsError::not_implemented(
            "releases are not available on Bitbucket Server",
        ))
    }

    async fn upload_release_file(
        &self,
        _repo: &str,
        _release_name: &str,
        _upload_url: &str,
        _artifact_name: &str,
        _content: Bytes,
    ) -> Result<()> {
        Err(VcsError::not_implemented(
            "release uploads are not available on Bitbucket Server",
        ))
    }

    async fn list_forks(&self, repo: &str) -> Result<Vec<VcsRepo>> {
        self.forks(repo).await
    }

    async fn get_archive(&self, repo: &str, dir: &str, format: &str, commit: &str) -> Result<VcsStream> {
        self.archive(repo, dir, format, commit).await
    }

    async fn list_content(&self, repo: &str, commit: &str, dir: &str) -> Result<Vec<VcsContent>> {
        self.files(repo, commit, dir).await
    }

    async fn get_content(&self, repo: &str, commit: &str, path: &str) -> Result<VcsContent> {
        self.file(repo, commit, path).await
    }

    async fn create_insight_report(&self, repo: &str, commit: &str, key: &str, report: &VcsInsight) -> Result<()> {
        self.put_insight(repo, commit, key, report).await
    }

    async fn grant_write_permission(&self, repo: &str) -> Result<()> {
        self.ensure_write_permission(repo).await
    }
}
