pub mod hooks;
pub mod oauth;
pub mod repos;
pub mod serve;
pub mod statuses;
pub mod version;

use crate::cache::{CacheStore, MemoryStore};
use crate::config::{self, CredentialStore, Settings};
use crate::engine::{ClientResolver, StaticCatalog, VcsLink};
use crate::errors::{Result, VcsError};
use crate::vcs::{Provider, VcsAuthorizedClient, VcsServer, VcsServerFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Everything a command needs, built once from the settings and credentials on disk
pub struct Context {
    pub settings: Settings,
    pub store: Arc<dyn CacheStore>,
    pub credentials: Arc<CredentialStore>,
    pub catalog: Arc<StaticCatalog>,
    pub resolver: Arc<ClientResolver>,
    factory: VcsServerFactory,
}

impl Context {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config_dir = config::get_config_dir()?;
        Self::load_from(&config_dir, config_path)
    }

    pub fn load_from(config_dir: &Path, config_path: Option<PathBuf>) -> Result<Self> {
        let settings_path = config_path.or_else(|| config::find_settings_file(config_dir));
        debug!("Loading settings from {:?}", settings_path);
        let settings = Settings::load(settings_path.as_deref())?;

        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let credentials = Arc::new(CredentialStore::open(config_dir)?);
        let catalog = Arc::new(StaticCatalog::from_config(&settings.links));

        let factory = VcsServerFactory::new(settings.clone(), store.clone(), settings.http_client()?);
        let resolver = Arc::new(ClientResolver::from_factory(&factory, credentials.clone())?);

        Ok(Self {
            settings,
            store,
            credentials,
            catalog,
            resolver,
            factory,
        })
    }

    pub fn server(&self, provider: Provider) -> Result<Arc<dyn VcsServer>> {
        self.factory.server(provider)
    }

    pub fn link(&self, id_or_name: &str) -> Result<&VcsLink> {
        self.catalog
            .link(id_or_name)
            .ok_or_else(|| VcsError::config(format!("Unknown VCS link '{id_or_name}'")))
    }

    pub async fn client(&self, id_or_name: &str) -> Result<Box<dyn VcsAuthorizedClient>> {
        let link = self.link(id_or_name)?;
        self.resolver.client_for(link).await
    }
}
