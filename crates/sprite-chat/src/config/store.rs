//! Persisted chat settings and the loader/saver boundary.
//!
//! The core never touches storage directly; callers hand it a
//! [`ConfigStore`] implementation. [`JsonFileStore`] is the default
//! file-backed one, [`MemoryStore`] backs tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::{ProviderCatalog, ProviderConfig};
use crate::error::Result;

const SPRITE_CHAT_DIR: &str = ".sprite-chat";
const CONFIG_FILE: &str = "config.json";

/// Environment variable to override the settings directory.
const SPRITE_CHAT_DIR_ENV: &str = "SPRITE_CHAT_DIR";

/// User-facing chat settings: which provider is active and the stored keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub selected_provider: String,
    /// API keys stored per provider name.
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
    /// Use the provider's bundled default key instead of a stored one.
    #[serde(default)]
    pub use_default_key: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_provider: "qwen".to_string(),
            api_keys: HashMap::new(),
            use_default_key: false,
        }
    }
}

impl Settings {
    /// Store a key for one provider.
    pub fn set_api_key(&mut self, provider: impl Into<String>, key: impl Into<String>) {
        self.api_keys.insert(provider.into(), key.into());
    }

    /// The key to send for `config`, honoring the default-key opt-in.
    /// Missing keys resolve to an empty string; auth failures surface at the
    /// transport layer, not here.
    pub fn api_key_for(&self, config: &ProviderConfig) -> String {
        if self.use_default_key {
            return config.api_key.clone();
        }
        self.api_keys.get(&config.name).cloned().unwrap_or_default()
    }

    /// Resolve the selected provider against `catalog`, with the stored key
    /// attached.
    pub fn resolve(&self, catalog: &ProviderCatalog) -> Result<ProviderConfig> {
        let config = catalog.get(&self.selected_provider)?;
        let api_key = self.api_key_for(&config);
        Ok(config.with_api_key(api_key))
    }
}

/// Loader/saver boundary for [`Settings`].
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<Settings>;
    async fn save(&self, settings: &Settings) -> Result<()>;
}

/// JSON file store at `~/.sprite-chat/config.json` (or `$SPRITE_CHAT_DIR`).
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location.
    /// Priority: SPRITE_CHAT_DIR env var > ~/.sprite-chat/
    pub fn default_location() -> Result<Self> {
        let dir = resolve_settings_dir()?;
        Ok(Self::new(dir.join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn resolve_settings_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(SPRITE_CHAT_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(SPRITE_CHAT_DIR))
        .ok_or_else(|| {
            crate::error::ChatError::Build("Failed to determine home directory".to_string())
        })
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn load(&self) -> Result<Settings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Settings>,
}

impl MemoryStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load(&self) -> Result<Settings> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        *self.inner.lock().await = settings.clone();
        Ok(())
    }
}
