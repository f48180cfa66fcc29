use super::authorized::{repo_path, split_fullname, BitbucketAuthorizedClient};
use super::client::{ApiFamily, PageRequest};
use super::types::{
    CommentRequest, CreatePullRequestRequest, ProjectRef, PullRequest, RefRequest, RepositoryRef,
    UserPermission,
};
use crate::errors::Result;
use crate::vcs::{VcsPullRequest, VcsPullRequestCommentRequest, VcsPullRequestState};
use tracing::{debug, info};

/// Permissions that already allow pushing and commenting
const WRITE_PERMISSIONS: [&str; 2] = ["REPO_WRITE", "REPO_ADMIN"];

impl BitbucketAuthorizedClient {
    pub(crate) async fn find_pull_request(&self, fullname: &str, id: u64) -> Result<VcsPullRequest> {
        let path = format!("{}/pull-requests/{id}", repo_path(fullname)?);
        let pr: PullRequest = self.client.get(ApiFamily::Core, &path, &[]).await?;
        Ok(pr.to_vcs_pull_request(self.client.base_url()))
    }

    pub(crate) async fn list_pull_requests(
        &self,
        fullname: &str,
        state: VcsPullRequestState,
    ) -> Result<Vec<VcsPullRequest>> {
        let path = format!("{}/pull-requests", repo_path(fullname)?);
        let prs: Vec<PullRequest> = self
            .client
            .paginate(PageRequest::core(path).query("state", state.as_str()))
            .await?;

        let base_url = self.client.base_url();
        Ok(prs.iter().map(|pr| pr.to_vcs_pull_request(base_url)).collect())
    }

    pub(crate) async fn comment_pull_request(
        &self,
        fullname: &str,
        comment: VcsPullRequestCommentRequest,
    ) -> Result<()> {
        let path = format!("{}/pull-requests/{}/comments", repo_path(fullname)?, comment.id);
        self.ensure_write_permission(fullname).await?;

        self.client
            .post_empty(
                ApiFamily::Core,
                &path,
                &CommentRequest {
                    text: comment.message,
                },
            )
            .await?;

        info!("Added comment to PR #{} on {}", comment.id, fullname);
        Ok(())
    }

    pub(crate) async fn create_pull_request(&self, fullname: &str, pr: VcsPullRequest) -> Result<VcsPullRequest> {
        let (project, slug) = split_fullname(fullname)?;
        let path = format!("{}/pull-requests", repo_path(fullname)?);
        self.ensure_write_permission(fullname).await?;

        let ref_request = |branch: &str| RefRequest {
            id: if branch.starts_with("refs/") {
                branch.to_string()
            } else {
                format!("refs/heads/{branch}")
            },
            repository: RepositoryRef {
                slug: slug.to_string(),
                project: ProjectRef {
                    key: project.to_string(),
                },
            },
        };

        let request = CreatePullRequestRequest {
            title: pr.title,
            description: pr.description,
            from_ref: ref_request(&pr.head.branch.display_id),
            to_ref: ref_request(&pr.base.branch.display_id),
        };
        debug!(
            "PR Request - Title: '{}', {} -> {}",
            request.title, request.from_ref.id, request.to_ref.id
        );

        let created: PullRequest = self.client.post(ApiFamily::Core, &path, &request).await?;
        info!("Created PR #{} on {}", created.id, fullname);
        Ok(created.to_vcs_pull_request(self.client.base_url()))
    }

    /// Grant `REPO_WRITE` to the acting user unless it already has it
    pub(crate) async fn ensure_write_permission(&self, fullname: &str) -> Result<()> {
        let path = format!("{}/permissions/users", repo_path(fullname)?);
        let Some(username) = self.client.username().map(str::to_string) else {
            debug!("No acting username for {}, skipping permission check", fullname);
            return Ok(());
        };

        let permissions: Vec<UserPermission> = self
            .client
            .paginate(PageRequest::core(path.clone()).query("filter", username.as_str()).fresh())
            .await?;

        let allowed = permissions.iter().any(|p| {
            (p.user.name == username || p.user.slug.as_deref() == Some(username.as_str()))
                && WRITE_PERMISSIONS.contains(&p.permission.as_str())
        });
        if allowed {
            return Ok(());
        }

        self.client
            .put_empty(
                ApiFamily::Core,
                &path,
                &[
                    ("permission", "REPO_WRITE".to_string()),
                    ("name", username.clone()),
                ],
            )
            .await?;
        info!("Granted REPO_WRITE on {} to {}", fullname, username);
        Ok(())
    }
}
