use crate::errors::{Result, VcsError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// An OAuth1 token/secret pair (request token or access token)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub token: String,
    pub secret: String,
}

impl OAuthToken {
    pub fn new<T: Into<String>, S: Into<String>>(token: T, secret: S) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("token", &redact(&self.token))
            .field("secret", &"***")
            .finish()
    }
}

/// Credentials for one VCS link, as returned by the secrets collaborator
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub token: String,
    /// Present only for OAuth1 access tokens
    pub secret: Option<String>,
    pub base_url: String,
}

impl AuthConfig {
    pub fn bearer<U: Into<String>, T: Into<String>>(username: U, token: T, base_url: &str) -> Self {
        Self {
            username: Some(username.into()),
            token: token.into(),
            secret: None,
            base_url: base_url.to_string(),
        }
    }

    pub fn oauth1(access: OAuthToken, base_url: &str) -> Self {
        Self {
            username: None,
            token: access.token,
            secret: Some(access.secret),
            base_url: base_url.to_string(),
        }
    }

    /// Which authentication path this credential selects
    pub fn credential(&self) -> Result<Credential> {
        if self.token.is_empty() {
            return Err(VcsError::config("credential has an empty token"));
        }
        match &self.secret {
            Some(secret) if !secret.is_empty() => Ok(Credential::OAuth1 {
                username: self.username.clone(),
                access: OAuthToken::new(self.token.clone(), secret.clone()),
            }),
            _ => Ok(Credential::Bearer {
                username: self.username.clone(),
                token: self.token.clone(),
            }),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("token", &redact(&self.token))
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Immutable credential held by an authorized client
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Personal access token, sent as `Authorization: Bearer`
    Bearer {
        username: Option<String>,
        token: String,
    },
    /// Three-legged OAuth1 access token, every request is signed
    OAuth1 {
        username: Option<String>,
        access: OAuthToken,
    },
}

impl Credential {
    pub fn username(&self) -> Option<&str> {
        match self {
            Credential::Bearer { username, .. } | Credential::OAuth1 { username, .. } => {
                username.as_deref()
            }
        }
    }

    pub(crate) fn token(&self) -> &str {
        match self {
            Credential::Bearer { token, .. } => token,
            Credential::OAuth1 { access, .. } => &access.token,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Bearer { username, token } => f
                .debug_struct("Bearer")
                .field("username", username)
                .field("token", &redact(token))
                .finish(),
            Credential::OAuth1 { username, access } => f
                .debug_struct("OAuth1")
                .field("username", username)
                .field("access", access)
                .finish(),
        }
    }
}

fn redact(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{visible}***")
}

/// Secrets collaborator: resolves a VCS link to its decrypted credential
#[async_trait]
pub trait SecretsProvider: Send + Sync {
    async fn get_decrypted_credential(&self, link_id: &str) -> Result<AuthConfig>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CredentialFile {
    links: HashMap<String, AuthConfig>,
}

/// File-backed credential store keyed by link id
pub struct CredentialStore {
    path: PathBuf,
    file: RwLock<CredentialFile>,
}

impl CredentialStore {
    /// Open (or lazily create) `credentials.json` in `config_dir`
    pub fn open(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join("credentials.json");
        let file = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                VcsError::config(format!("Failed to read credentials file: {e}"))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                VcsError::config(format!("Failed to parse credentials file: {e}"))
            })?
        } else {
            CredentialFile::default()
        };

        Ok(Self {
            path,
            file: RwLock::new(file),
        })
    }

    /// Store credentials for a link
    pub fn store(&self, link_id: &str, auth: AuthConfig) -> Result<()> {
        let snapshot = {
            let mut file = self.write_guard();
            file.links.insert(link_id.to_string(), auth);
            file.clone()
        };
        self.save(&snapshot)?;
        tracing::info!("Stored credentials for link {}", link_id);
        Ok(())
    }

    pub fn get(&self, link_id: &str) -> Option<AuthConfig> {
        self.read_guard().links.get(link_id).cloned()
    }

    /// Remove credentials for a link, returns whether something was removed
    pub fn remove(&self, link_id: &str) -> Result<bool> {
        let snapshot = {
            let mut file = self.write_guard();
            if file.links.remove(link_id).is_none() {
                return Ok(false);
            }
            file.clone()
        };
        self.save(&snapshot)?;
        tracing::info!("Removed credentials for link {}", link_id);
        Ok(true)
    }

    pub fn list_links(&self) -> Vec<String> {
        let mut links: Vec<String> = self.read_guard().links.keys().cloned().collect();
        links.sort();
        links
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, CredentialFile> {
        self.file.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, CredentialFile> {
        self.file.write().unwrap_or_else(|e| e.into_inner())
    }

    fn save(&self, file: &CredentialFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                VcsError::config(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(file)
            .map_err(|e| VcsError::config(format!("Failed to serialize credentials: {e}")))?;

        // Write to temporary file first, then rename for atomic write
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)
            .map_err(|e| VcsError::config(format!("Failed to write credentials: {e}")))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| VcsError::config(format!("Failed to finalize credentials: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl SecretsProvider for CredentialStore {
    async fn get_decrypted_credential(&self, link_id: &str) -> Result<AuthConfig> {
        self.get(link_id)
            .ok_or_else(|| VcsError::config(format!("No credentials configured for link {link_id}")))
    }
}
