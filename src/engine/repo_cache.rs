//! Background pre-warming of the shared repository cache
//!
//! One loader runs per engine instance; a lease key in the shared store keeps
//! them from loading at the same time. The lease is best effort: if a load
//! outlives the lease TTL, another instance may start a second load. That only
//! costs duplicate API calls since every load writes the same keys.

use super::{ClientResolver, ProjectCatalog, VcsLink};
use crate::cache::{self, CacheStore};
use crate::config::LoaderSettings;
use crate::errors::Result;
use crate::vcs::{Provider, VcsRepo};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const LEASE_KEY: &str = "vcs:repos:loader:lease";

/// Where the repositories of one link are stored
pub fn repos_key(provider: Provider, project_key: &str, link_name: &str) -> String {
    cache::key(&["vcs", "repos", provider.as_str(), project_key, link_name])
}

/// Repositories stored by the last load of a link
pub async fn cached_repos(
    store: &dyn CacheStore,
    provider: Provider,
    project_key: &str,
    link_name: &str,
) -> Result<Option<Vec<VcsRepo>>> {
    cache::get_json(store, &repos_key(provider, project_key, link_name)).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another holder owns the lease
    Skipped,
    Loaded { repos: usize },
}

pub struct RepoCacheLoader {
    store: Arc<dyn CacheStore>,
    catalog: Arc<dyn ProjectCatalog>,
    resolver: Arc<ClientResolver>,
    delay: Duration,
    lease_ttl: Duration,
}

impl RepoCacheLoader {
    pub fn new(
        store: Arc<dyn CacheStore>,
        catalog: Arc<dyn ProjectCatalog>,
        resolver: Arc<ClientResolver>,
        settings: &LoaderSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            resolver,
            delay: settings.delay(),
            lease_ttl: settings.lease_ttl(),
        }
    }

    /// Load now, then every `delay`, until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Repository cache loader started (every {:?})", self.delay);
        loop {
            match self.tick().await {
                Ok(TickOutcome::Skipped) => debug!("Repository load already running elsewhere"),
                Ok(TickOutcome::Loaded { repos }) => info!("Cached {} repositories", repos),
                Err(e) => warn!("Repository cache load failed: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        info!("Repository cache loader stopped");
    }

    /// One load under the lease. Only store errors around the lease surface here.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let owner = uuid::Uuid::new_v4().to_string();
        let acquired = self
            .store
            .set_if_absent(LEASE_KEY, owner.clone().into_bytes(), self.lease_ttl)
            .await?;
        if !acquired {
            return Ok(TickOutcome::Skipped);
        }

        let repos = self.load_all().await;

        match self.store.delete_if_equals(LEASE_KEY, owner.as_bytes()).await {
            Ok(true) => {}
            Ok(false) => warn!("Loader lease expired before the load finished"),
            Err(e) => warn!("Unable to release loader lease: {}", e),
        }

        Ok(TickOutcome::Loaded { repos })
    }

    async fn load_all(&self) -> usize {
        let projects = match self.catalog.project_keys().await {
            Ok(projects) => projects,
            Err(e) => {
                warn!("Unable to list projects: {}", e);
                return 0;
            }
        };

        let mut total = 0;
        for project_key in &projects {
            let links = match self.catalog.vcs_links(project_key).await {
                Ok(links) => links,
                Err(e) => {
                    warn!("Unable to list VCS links of {}: {}", project_key, e);
                    continue;
                }
            };

            for link in &links {
                match self.load_link(project_key, link).await {
                    Ok(count) => total += count,
                    Err(e) => warn!(
                        "Unable to load repositories of {}/{}: {}",
                        project_key, link.name, e
                    ),
                }
            }
        }
        total
    }

    async fn load_link(&self, project_key: &str, link: &VcsLink) -> Result<usize> {
        let client = self.resolver.client_for(link).await?;
        let repos = client.repos().await?;

        let key = repos_key(link.provider, project_key, &link.name);
        cache::set_json(self.store.as_ref(), &key, &repos, None).await?;
        debug!("Stored {} repositories under {}", repos.len(), key);
        Ok(repos.len())
    }
}
