pub mod auth;
pub mod settings;

pub use auth::{AuthConfig, CredentialStore, Credential, OAuthToken, SecretsProvider};
pub use settings::{
    BitbucketSettings, CacheSettings, HttpSettings, LinkConfig, LoaderSettings, OAuthSettings,
    Settings, StatusSettings,
};

use crate::errors::{Result, VcsError};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory (~/.vcs-bridge/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| VcsError::config("Could not find home directory"))?;
    Ok(home_dir.join(".vcs-bridge"))
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        fs::create_dir_all(config_dir).map_err(|e| {
            VcsError::config(format!("Failed to create config directory: {e}"))
        })?;
    }
    Ok(())
}

/// Settings file inside a config dir, if one exists
pub fn find_settings_file(config_dir: &Path) -> Option<PathBuf> {
    ["settings.toml", "settings.json", "settings.yaml"]
        .iter()
        .map(|name| config_dir.join(name))
        .find(|path| path.exists())
}
