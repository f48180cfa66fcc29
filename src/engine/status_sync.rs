use super::{ClientResolver, VcsLink};
use crate::config::StatusSettings;
use crate::errors::Result;
use crate::vcs::status::status_key;
use crate::vcs::{
    BuildStatus, VcsAuthorizedClient, VcsBuildStatus, VcsPullRequestCommentRequest,
    VcsPullRequestState,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle event of one workflow node run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub project_key: String,
    pub workflow_name: String,
    pub node_name: String,
    pub run_number: u64,
    pub hash: String,
    pub status: BuildStatus,
    pub repository_fullname: String,
    pub link: VcsLink,
}

/// Pushes engine build statuses onto provider commits and pull requests
pub struct StatusSynchronizer {
    resolver: Arc<ClientResolver>,
    settings: StatusSettings,
}

impl StatusSynchronizer {
    pub fn new(resolver: Arc<ClientResolver>, settings: StatusSettings) -> Self {
        Self { resolver, settings }
    }

    pub fn build_status(&self, event: &BuildEvent) -> VcsBuildStatus {
        let key = status_key(&event.project_key, &event.workflow_name, &event.node_name);
        let url_cds = if self.settings.disable_status_details {
            String::new()
        } else {
            format!(
                "{}/project/{}/workflow/{}/run/{}",
                self.settings.ui_url.trim_end_matches('/'),
                event.project_key,
                event.workflow_name,
                event.run_number
            )
        };

        VcsBuildStatus {
            title: format!("{key}-{}", event.run_number),
            description: format!(
                "{}{}: {}",
                self.settings.description_prefix, key, event.status
            ),
            url_cds,
            context: key,
            status: event.status.to_string(),
            repository_fullname: event.repository_fullname.clone(),
            git_hash: event.hash.clone(),
        }
    }

    /// Resolve the link's client and push the event
    pub async fn process(&self, event: &BuildEvent) -> Result<()> {
        if self.settings.disable_status {
            debug!("Statuses are disabled, ignoring event for {}", event.hash);
            return Ok(());
        }
        let client = self.resolver.client_for(&event.link).await?;
        self.process_with(client.as_ref(), event).await
    }

    pub async fn process_with(&self, client: &dyn VcsAuthorizedClient, event: &BuildEvent) -> Result<()> {
        if self.settings.disable_status {
            debug!("Statuses are disabled, ignoring event for {}", event.hash);
            return Ok(());
        }

        let status = self.build_status(event);
        client.set_status(&status).await?;

        if self.settings.comment_on_pull_request && event.status.is_terminal() {
            self.comment(client, event, &status).await?;
        }
        Ok(())
    }

    async fn comment(&self, client: &dyn VcsAuthorizedClient, event: &BuildEvent, status: &VcsBuildStatus) -> Result<()> {
        let repo = &event.repository_fullname;
        let Some(pr) = client
            .search_pull_request(repo, &event.hash, VcsPullRequestState::Open)
            .await?
        else {
            debug!("No open pull request for {} on {}", event.hash, repo);
            return Ok(());
        };

        let mut message = format!("{} #{}: {}", status.context, event.run_number, event.status);
        if !status.url_cds.is_empty() {
            message.push_str(&format!("\n{}", status.url_cds));
        }

        client
            .pull_request_comment(repo, VcsPullRequestCommentRequest { id: pr.id, message })
            .await?;
        info!("Commented build result on PR #{} of {}", pr.id, repo);
        Ok(())
    }

    /// Drain events until every sender is gone. Per-event failures are logged.
    pub async fn run(&self, mut events: mpsc::Receiver<BuildEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.process(&event).await {
                warn!(
                    "Unable to push status of {} on {}: {}",
                    event.hash, event.repository_fullname, e
                );
            }
        }
        info!("Status synchronizer stopped");
    }
}
