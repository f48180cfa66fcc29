//! Engine-side consumers of the VCS contract
//!
//! Nothing in here knows which provider it talks to: clients are resolved from
//! a link through the registered [`VcsServer`]s and the secrets collaborator.

pub mod repo_cache;
pub mod status_sync;

pub use repo_cache::{cached_repos, RepoCacheLoader, TickOutcome};
pub use status_sync::{BuildEvent, StatusSynchronizer};

use crate::config::{LinkConfig, SecretsProvider};
use crate::errors::{Result, VcsError};
use crate::vcs::{Provider, VcsAuthorizedClient, VcsServer, VcsServerFactory};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A project's connection to one VCS account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsLink {
    pub id: String,
    pub name: String,
    pub project_key: String,
    pub provider: Provider,
}

impl From<&LinkConfig> for VcsLink {
    fn from(link: &LinkConfig) -> Self {
        Self {
            id: link.id.clone(),
            name: link.name.clone(),
            project_key: link.project_key.clone(),
            provider: link.provider,
        }
    }
}

/// Projects and their links, owned by the engine database
#[async_trait]
pub trait ProjectCatalog: Send + Sync {
    async fn project_keys(&self) -> Result<Vec<String>>;
    async fn vcs_links(&self, project_key: &str) -> Result<Vec<VcsLink>>;
}

/// Catalog backed by a fixed list, used by the binary and in tests
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    links: Vec<VcsLink>,
}

impl StaticCatalog {
    pub fn new(links: Vec<VcsLink>) -> Self {
        Self { links }
    }

    pub fn from_config(links: &[LinkConfig]) -> Self {
        Self::new(links.iter().map(VcsLink::from).collect())
    }

    pub fn link(&self, id_or_name: &str) -> Option<&VcsLink> {
        self.links
            .iter()
            .find(|l| l.id == id_or_name || l.name == id_or_name)
    }
}

#[async_trait]
impl ProjectCatalog for StaticCatalog {
    async fn project_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.links.iter().map(|l| l.project_key.clone()).collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn vcs_links(&self, project_key: &str) -> Result<Vec<VcsLink>> {
        Ok(self
            .links
            .iter()
            .filter(|l| l.project_key == project_key)
            .cloned()
            .collect())
    }
}

/// Builds an authorized client for a link: server by provider, credential by link id
pub struct ClientResolver {
    servers: HashMap<Provider, Arc<dyn VcsServer>>,
    secrets: Arc<dyn SecretsProvider>,
}

impl ClientResolver {
    pub fn new(secrets: Arc<dyn SecretsProvider>) -> Self {
        Self {
            servers: HashMap::new(),
            secrets,
        }
    }

    /// Register every provider the factory can build
    pub fn from_factory(factory: &VcsServerFactory, secrets: Arc<dyn SecretsProvider>) -> Result<Self> {
        let mut resolver = Self::new(secrets);
        for provider in VcsServerFactory::supported_providers() {
            resolver = resolver.with_server(factory.server(provider)?);
        }
        Ok(resolver)
    }

    pub fn with_server(mut self, server: Arc<dyn VcsServer>) -> Self {
        self.servers.insert(server.provider(), server);
        self
    }

    pub fn server(&self, provider: Provider) -> Result<Arc<dyn VcsServer>> {
        self.servers
            .get(&provider)
            .cloned()
            .ok_or_else(|| VcsError::not_implemented(format!("{provider} provider is not available")))
    }

    pub async fn client_for(&self, link: &VcsLink) -> Result<Box<dyn VcsAuthorizedClient>> {
        let server = self.server(link.provider)?;
        let auth = self.secrets.get_decrypted_credential(&link.id).await?;
        server.get_authorized_client(&auth)
    }
}
