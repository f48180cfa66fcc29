use super::VcsServer;
use crate::bitbucket::BitbucketServer;
use crate::cache::CacheStore;
use crate::config::Settings;
use crate::errors::{Result, VcsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Closed set of supported hosting providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    BitbucketServer,
    BitbucketCloud,
    GitHub,
    GitLab,
    Gerrit,
    Gitea,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::BitbucketServer,
        Provider::BitbucketCloud,
        Provider::GitHub,
        Provider::GitLab,
        Provider::Gerrit,
        Provider::Gitea,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::BitbucketServer => "bitbucketserver",
            Provider::BitbucketCloud => "bitbucketcloud",
            Provider::GitHub => "github",
            Provider::GitLab => "gitlab",
            Provider::Gerrit => "gerrit",
            Provider::Gitea => "gitea",
        }
    }

    /// Webhook events registered when the caller asks for none
    pub fn default_hook_events(&self) -> &'static [&'static str] {
        match self {
            Provider::BitbucketServer => &["repo:refs_changed"],
            Provider::BitbucketCloud => &["repo:push"],
            Provider::GitHub | Provider::Gitea => &["push"],
            Provider::GitLab => &["Push Hook", "Tag Push Hook"],
            Provider::Gerrit => &["patchset-created"],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = VcsError;

    fn from_str(s: &str) -> Result<Self> {
        Provider::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| VcsError::config(format!("Unknown VCS provider: {s}")))
    }
}

/// Factory for creating VCS servers, keyed on the provider tag
pub struct VcsServerFactory {
    settings: Settings,
    store: Arc<dyn CacheStore>,
    http: reqwest::Client,
}

impl VcsServerFactory {
    pub fn new(settings: Settings, store: Arc<dyn CacheStore>, http: reqwest::Client) -> Self {
        Self {
            settings,
            store,
            http,
        }
    }

    pub fn server(&self, provider: Provider) -> Result<Arc<dyn VcsServer>> {
        match provider {
            Provider::BitbucketServer => {
                let server = BitbucketServer::from_settings(
                    &self.settings,
                    self.store.clone(),
                    self.http.clone(),
                )?;
                Ok(Arc::new(server))
            }
            other => Err(VcsError::not_implemented(format!(
                "{other} provider is not available"
            ))),
        }
    }

    pub fn supported_providers() -> Vec<Provider> {
        vec![Provider::BitbucketServer]
    }

    pub fn is_provider_supported(provider: &Provider) -> bool {
        matches!(provider, Provider::BitbucketServer)
    }
}
