use super::authorized::{repo_path, BitbucketAuthorizedClient};
use super::client::{path_segments, segment, ApiFamily, PageRequest};
use super::types::BuildStatusPayload;
use crate::errors::{ErrorKind, Result, VcsError};
use crate::vcs::{BuildStatus, VcsBuildStatus, VcsCommitStatus, VcsInsight};
use tracing::{debug, info};

impl BitbucketAuthorizedClient {
    pub(crate) async fn post_status(&self, status: &VcsBuildStatus) -> Result<()> {
        if status.git_hash.is_empty() {
            return Err(VcsError::WrongRequest(format!(
                "status {} has no commit hash",
                status.context
            )));
        }

        let payload = BuildStatusPayload {
            state: BuildStatus::from(status.status.as_str()).commit_state(),
            key: status.context.clone(),
            name: status.title.clone(),
            url: status.url_cds.clone(),
            description: status.description.clone(),
            date_added: 0,
        };
        debug!("SetStatus> hash:{} status:{:?}", status.git_hash, payload);

        let path = format!("commits/{}", segment(&status.git_hash));
        match self
            .client
            .post_empty(ApiFamily::BuildStatus, &path, &payload)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is(ErrorKind::NotFound) => {
                debug!("Commit {} unknown to the build-status API, status {} dropped", status.git_hash, payload.key);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        info!(
            "Posted {} status {} on {}",
            payload.state, payload.key, status.git_hash
        );
        Ok(())
    }

    /// Statuses on `git_ref` that this engine posted, identified by description prefix
    pub(crate) async fn own_statuses(&self, fullname: &str, git_ref: &str) -> Result<Vec<VcsCommitStatus>> {
        repo_path(fullname)?;
        let path = format!("commits/{}", segment(git_ref));
        let statuses: Vec<BuildStatusPayload> = self
            .client
            .paginate(
                PageRequest::core(path)
                    .family(ApiFamily::BuildStatus)
                    .fresh(),
            )
            .await?;

        Ok(statuses
            .iter()
            .filter(|s| s.description.starts_with(&self.status_prefix))
            .map(|s| s.to_vcs_status(git_ref))
            .collect())
    }

    pub(crate) async fn put_insight(
        &self,
        fullname: &str,
        commit: &str,
        key: &str,
        report: &VcsInsight,
    ) -> Result<()> {
        let path = format!(
            "{}/commits/{}/reports/{}",
            repo_path(fullname)?,
            segment(commit),
            path_segments(key)
        );
        let _: serde_json::Value = self.client.put(ApiFamily::Insights, &path, report).await?;

        info!("Published insight report {} on {}", key, commit);
        Ok(())
    }
}
