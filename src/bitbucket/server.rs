use super::authorized::BitbucketAuthorizedClient;
use super::client::BitbucketClient;
use super::oauth::OAuthConsumer;
use crate::cache::CacheStore;
use crate::config::{AuthConfig, Credential, OAuthToken, Settings};
use crate::errors::{Result, VcsError};
use crate::vcs::{Provider, VcsAuthorizedClient, VcsServer};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Bitbucket Server consumer: owns the OAuth1 flow and hands out authorized clients
pub struct BitbucketServer {
    base_url: String,
    http: reqwest::Client,
    cache: Arc<dyn CacheStore>,
    cache_ttl: Option<Duration>,
    page_size: usize,
    status_prefix: String,
    oauth: Option<Arc<OAuthConsumer>>,
}

impl BitbucketServer {
    pub fn new(base_url: &str, http: reqwest::Client, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            cache,
            cache_ttl: None,
            page_size: 1000,
            status_prefix: "CDS/".to_string(),
            oauth: None,
        }
    }

    pub fn from_settings(settings: &Settings, cache: Arc<dyn CacheStore>, http: reqwest::Client) -> Result<Self> {
        let mut server = Self::new(&settings.bitbucket.url, http.clone(), cache)
            .with_cache_ttl(settings.cache.response_ttl())
            .with_page_size(settings.bitbucket.page_size)
            .with_status_prefix(&settings.status.description_prefix);

        if let Some(oauth) = &settings.bitbucket.oauth {
            let consumer = OAuthConsumer::from_settings(oauth, &settings.bitbucket.url, http)?;
            server = server.with_oauth(consumer);
        }
        Ok(server)
    }

    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_status_prefix(mut self, prefix: &str) -> Self {
        self.status_prefix = prefix.to_string();
        self
    }

    pub fn with_oauth(mut self, consumer: OAuthConsumer) -> Self {
        self.oauth = Some(Arc::new(consumer));
        self
    }

    fn consumer(&self) -> Result<&OAuthConsumer> {
        self.oauth
            .as_deref()
            .ok_or_else(|| VcsError::config("No OAuth consumer configured for Bitbucket Server"))
    }

    /// Concrete client for `auth`, for callers that need Bitbucket specifics
    pub fn authorized_client(&self, auth: &AuthConfig) -> Result<BitbucketAuthorizedClient> {
        let credential = auth.credential()?;

        let base_url = if auth.base_url.is_empty() {
            self.base_url.as_str()
        } else {
            auth.base_url.as_str()
        };
        if base_url.is_empty() {
            return Err(VcsError::config("No Bitbucket Server URL for this credential"));
        }

        let mut client = BitbucketClient::new(self.http.clone(), base_url, credential.clone(), self.cache.clone())
            .with_cache_ttl(self.cache_ttl)
            .with_page_size(self.page_size);

        if let Credential::OAuth1 { .. } = credential {
            let consumer = self.oauth.clone().ok_or_else(|| {
                VcsError::config("OAuth1 credential but no OAuth consumer configured")
            })?;
            client = client.with_oauth(consumer);
        }

        Ok(BitbucketAuthorizedClient::new(client, self.status_prefix.clone()))
    }
}

#[async_trait]
impl VcsServer for BitbucketServer {
    fn provider(&self) -> Provider {
        Provider::BitbucketServer
    }

    async fn authorize_redirect(&self) -> Result<(OAuthToken, String)> {
        self.consumer()?.authorize_redirect().await
    }

    async fn authorize_token(&self, request_token: &OAuthToken, verifier: &str) -> Result<OAuthToken> {
        self.consumer()?.authorize_token(request_token, verifier).await
    }

    fn get_authorized_client(&self, auth: &AuthConfig) -> Result<Box<dyn VcsAuthorizedClient>> {
        Ok(Box::new(self.authorized_client(auth)?))
    }
}
