use super::authorized::{repo_path, BitbucketAuthorizedClient};
use super::client::{segment, ApiFamily, PageRequest};
use super::types::Webhook;
use crate::errors::{ErrorKind, Result, VcsError};
use crate::vcs::{Provider, VcsHook};
use tracing::{debug, info};

const DEFAULT_HOOK_NAME: &str = "cds";

impl BitbucketAuthorizedClient {
    /// Hook listings always bypass the cache; they guard writes
    async fn webhooks(&self, fullname: &str) -> Result<Vec<Webhook>> {
        let path = format!("{}/webhooks", repo_path(fullname)?);
        self.client.paginate(PageRequest::core(path).fresh()).await
    }

    pub(crate) async fn find_hook(&self, fullname: &str, url: &str) -> Result<VcsHook> {
        self.webhooks(fullname)
            .await?
            .iter()
            .find(|h| h.url == url)
            .map(Webhook::to_vcs_hook)
            .ok_or_else(|| VcsError::HookNotFound(format!("{url} on {fullname}")))
    }

    /// Create the hook unless one with the same URL exists. The id is written back.
    pub(crate) async fn register_hook(&self, fullname: &str, hook: &mut VcsHook) -> Result<()> {
        let path = format!("{}/webhooks", repo_path(fullname)?);

        if let Some(existing) = self
            .webhooks(fullname)
            .await?
            .into_iter()
            .find(|h| h.url == hook.url)
        {
            debug!("Hook {} already registered on {}", hook.url, fullname);
            if let Some(id) = existing.id {
                hook.id = id.to_string();
            }
            return Ok(());
        }

        if hook.events.is_empty() {
            hook.events = Provider::BitbucketServer
                .default_hook_events()
                .iter()
                .map(|e| e.to_string())
                .collect();
        }

        let request = Webhook {
            id: None,
            name: if hook.name.is_empty() {
                DEFAULT_HOOK_NAME.to_string()
            } else {
                hook.name.clone()
            },
            url: hook.url.clone(),
            events: hook.events.clone(),
            active: true,
            configuration: Default::default(),
        };

        let created: Webhook = self.client.post(ApiFamily::Core, &path, &request).await?;
        let id = created
            .id
            .ok_or_else(|| VcsError::transport("Webhook created without an id", hook.url.clone()))?;
        hook.id = id.to_string();
        hook.enabled = true;

        info!("Created hook {} on {} ({})", hook.id, fullname, hook.url);
        Ok(())
    }

    /// Replace the event list of an existing hook, leaving the rest untouched
    pub(crate) async fn overlay_hook_events(&self, fullname: &str, hook: &VcsHook) -> Result<()> {
        let path = hook_path(fullname, hook)?;

        let mut existing: Webhook = self.client.get_fresh(ApiFamily::Core, &path, &[]).await?;
        existing.events = hook.events.clone();

        let _: Webhook = self.client.put(ApiFamily::Core, &path, &existing).await?;
        info!("Updated hook {} on {}", hook.id, fullname);
        Ok(())
    }

    /// Delete by id; an already deleted hook counts as success
    pub(crate) async fn remove_hook(&self, fullname: &str, hook: &VcsHook) -> Result<()> {
        let path = hook_path(fullname, hook)?;

        match self.client.delete(ApiFamily::Core, &path).await {
            Ok(()) => {
                info!("Deleted hook {} on {}", hook.id, fullname);
                Ok(())
            }
            Err(e) if e.is(ErrorKind::NotFound) => {
                debug!("Hook {} already gone from {}", hook.id, fullname);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn hook_path(fullname: &str, hook: &VcsHook) -> Result<String> {
    let base = repo_path(fullname)?;
    if hook.id.is_empty() {
        return Err(VcsError::WrongRequest(format!(
            "hook {} on {} has no id",
            hook.url, fullname
        )));
    }
    Ok(format!("{base}/webhooks/{}", segment(&hook.id)))
}
