//! On-disk configuration and API key lookup.
//!
//! The configuration lives at `$XDG_CONFIG_HOME/q/config.json`, falling back to the
//! platform configuration directory when `XDG_CONFIG_HOME` is unset.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::LLMError;

const APP_DIR: &str = "q";
const CONFIG_FILE_NAME: &str = "config.json";
const SECRET_NOTE: &str = "This file stores secret API credentials. Do not share!";

/// Source of API keys, consulted on every outbound request.
pub trait CredentialStore: Send + Sync {
    /// Returns the key for `provider`, or `None` when none is configured.
    fn api_key(&self, provider: &str) -> Result<Option<String>, LLMError>;
}

/// Thread-safe handle to a credential store.
pub type DynCredentialStore = Arc<dyn CredentialStore>;

/// Persisted settings: default model and per-provider API keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "// Note", default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(default)]
    pub default_model: String,
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,
}

impl Config {
    /// Key for `provider`, treating an empty string as unset.
    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.api_keys
            .get(provider)
            .map(String::as_str)
            .filter(|key| !key.is_empty())
    }
}

/// File-backed configuration. Every read goes back to disk, so a key saved by another
/// process is picked up on the next request.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Uses an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolves the default location from the environment.
    pub fn from_env() -> Result<Self, LLMError> {
        Ok(Self::new(default_config_dir()?.join(CONFIG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration; a missing file yields the defaults.
    pub fn load(&self) -> Result<Config, LLMError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Config::default());
            }
            Err(err) => return Err(config_error(&self.path, err)),
        };
        serde_json::from_str(&data).map_err(|err| config_error(&self.path, err))
    }

    /// Writes the configuration, creating the directory if needed.
    pub fn save(&self, config: &Config) -> Result<(), LLMError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|err| config_error(dir, err))?;
            restrict_permissions(dir, 0o700)?;
        }

        let mut config = config.clone();
        config.note = SECRET_NOTE.to_string();
        let data =
            serde_json::to_string_pretty(&config).map_err(|err| config_error(&self.path, err))?;
        fs::write(&self.path, data).map_err(|err| config_error(&self.path, err))?;
        restrict_permissions(&self.path, 0o600)?;

        tracing::debug!(path = %self.path.display(), "saved config");
        Ok(())
    }

    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), LLMError> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    /// Stored default `provider/model`, or `None` when unset.
    pub fn default_model(&self) -> Result<Option<String>, LLMError> {
        let config = self.load()?;
        Ok(Some(config.default_model).filter(|model| !model.is_empty()))
    }

    pub fn set_default_model(&self, model: &str) -> Result<(), LLMError> {
        let mut config = self.load()?;
        config.default_model = model.to_string();
        self.save(&config)
    }
}

impl CredentialStore for ConfigStore {
    fn api_key(&self, provider: &str) -> Result<Option<String>, LLMError> {
        Ok(self.load()?.api_key(provider).map(str::to_string))
    }
}

/// Fixed in-memory keys, for embedding the providers without a config file.
///
/// # Examples
///
/// ```
/// use q::config::{CredentialStore, StaticCredentials};
///
/// let store = StaticCredentials::default().with_key("openai", "sk-test");
/// assert_eq!(store.api_key("openai").unwrap().as_deref(), Some("sk-test"));
/// assert_eq!(store.api_key("google").unwrap(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn with_key(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys.insert(provider.into(), key.into());
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn api_key(&self, provider: &str) -> Result<Option<String>, LLMError> {
        Ok(self.keys.get(provider).cloned())
    }
}

fn default_config_dir() -> Result<PathBuf, LLMError> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_DIR));
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| LLMError::Config {
            message: "cannot determine the user configuration directory".to_string(),
        })
}

fn config_error(path: &Path, err: impl std::fmt::Display) -> LLMError {
    LLMError::Config {
        message: format!("{}: {err}", path.display()),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> Result<(), LLMError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|err| config_error(path, err))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path, _mode: u32) -> Result<(), LLMError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join(APP_DIR).join(CONFIG_FILE_NAME))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);

        assert_eq!(store.load().expect("load"), Config::default());
        assert_eq!(store.api_key("openai").expect("key"), None);
        assert_eq!(store.default_model().expect("default"), None);
    }

    #[test]
    fn keys_and_default_model_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);

        store.set_api_key("openai", "sk-1").expect("set key");
        store
            .set_default_model("openai/gpt-4o")
            .expect("set default");

        let reopened = store_in(&dir);
        assert_eq!(
            reopened.api_key("openai").expect("key").as_deref(),
            Some("sk-1")
        );
        assert_eq!(
            reopened.default_model().expect("default").as_deref(),
            Some("openai/gpt-4o")
        );

        let raw = fs::read_to_string(reopened.path()).expect("read");
        assert!(raw.contains("\"// Note\""), "{raw}");
        assert!(raw.contains("\"api_keys\""), "{raw}");
    }

    #[test]
    fn empty_key_counts_as_unset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.set_api_key("google", "").expect("set key");
        assert_eq!(store.api_key("google").expect("key"), None);
    }

    #[test]
    fn corrupt_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().expect("parent")).expect("mkdir");
        fs::write(store.path(), "{not json").expect("write");

        match store.load() {
            Err(LLMError::Config { message }) => assert!(message.contains("config.json")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.set_api_key("anthropic", "sk-ant").expect("set key");

        let mode = fs::metadata(store.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
