use crate::errors::{Result, VcsError};
use crate::vcs::Provider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http: HttpSettings,
    pub cache: CacheSettings,
    pub bitbucket: BitbucketSettings,
    pub status: StatusSettings,
    pub loader: LoaderSettings,
    /// Static link catalog used by the binary
    pub links: Vec<LinkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL of cached GET responses; `None` keeps them until invalidated
    pub response_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BitbucketSettings {
    /// Fallback base URL when a credential carries none
    pub url: String,
    pub page_size: usize,
    pub oauth: Option<OAuthSettings>,
}

/// Consumer registered as an application link on the server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub consumer_key: String,
    /// PEM private key for RSA-SHA1 signing
    pub private_key_path: Option<PathBuf>,
    /// Shared secret for HMAC-SHA1 signing, used when no private key is set
    pub consumer_secret: Option<String>,
    pub callback_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    /// Base URL of the engine UI, used for deep links
    pub ui_url: String,
    /// Prefix carried by every status description we post
    pub description_prefix: String,
    pub disable_status: bool,
    pub disable_status_details: bool,
    pub comment_on_pull_request: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    pub delay_secs: u64,
    pub lease_ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub id: String,
    pub name: String,
    pub project_key: String,
    pub provider: Provider,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("vcs-bridge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            response_ttl_secs: Some(60),
        }
    }
}

impl Default for BitbucketSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            page_size: 1000,
            oauth: None,
        }
    }
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            ui_url: "http://localhost:8080".to_string(),
            description_prefix: "CDS/".to_string(),
            disable_status: false,
            disable_status_details: false,
            comment_on_pull_request: false,
        }
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            delay_secs: 600,
            lease_ttl_secs: 900,
        }
    }
}

impl CacheSettings {
    pub fn response_ttl(&self) -> Option<Duration> {
        self.response_ttl_secs.map(Duration::from_secs)
    }
}

impl LoaderSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }
}

impl Settings {
    /// Load settings from an optional file, then `VCS_BRIDGE__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(VcsError::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("VCS_BRIDGE")
                .prefix_separator("__")
                .separator("__"),
        );

        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| VcsError::config(format!("Failed to load settings: {e}")))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| VcsError::config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)
            .map_err(|e| VcsError::config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .user_agent(self.http.user_agent.clone())
            .build()
            .map_err(|e| VcsError::config(format!("Failed to create HTTP client: {e}")))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.bitbucket.url.is_empty() && !is_http_url(&self.bitbucket.url) {
            return Err(VcsError::config(
                "Bitbucket URL must start with http:// or https://",
            ));
        }

        if self.bitbucket.page_size == 0 {
            return Err(VcsError::config("Page size must be greater than zero"));
        }

        if self.http.timeout_secs == 0 {
            return Err(VcsError::config("HTTP timeout must be greater than zero"));
        }

        if let Some(oauth) = &self.bitbucket.oauth {
            if oauth.consumer_key.is_empty() {
                return Err(VcsError::config("OAuth consumer key is required"));
            }
            if oauth.private_key_path.is_none() && oauth.consumer_secret.is_none() {
                return Err(VcsError::config(
                    "OAuth needs either a private key path or a consumer secret",
                ));
            }
        }

        if !is_http_url(&self.status.ui_url) {
            return Err(VcsError::config("UI URL must start with http:// or https://"));
        }

        if self.loader.lease_ttl_secs == 0 {
            return Err(VcsError::config("Loader lease TTL must be greater than zero"));
        }

        let mut seen = std::collections::HashSet::new();
        for link in &self.links {
            if !seen.insert(link.id.as_str()) {
                return Err(VcsError::config(format!("Duplicate link id: {}", link.id)));
            }
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
