use miette::Result;
use miette::miette;
use serde::{Deserialize, Serialize};

use std::future::Future;
use std::path::Path;
use std::path::PathBuf;

use crate::error::{MarginaliaError, ParseError, SerDeError};

/// Environment variable overriding [`Config::api_url`].
pub const ENV_API_URL: &str = "MARGINALIA_API_URL";
/// Environment variable overriding [`Config::settle_delay_ms`].
pub const ENV_SETTLE_DELAY: &str = "MARGINALIA_SETTLE_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the annotation API, e.g. `http://localhost:8080/api/v1`.
    pub api_url: String,
    /// Delay before decorations are drawn after a marker is injected.
    pub settle_delay_ms: u32,
    /// Delay before a pointer release reads the selection.
    pub selection_delay_ms: u32,
    /// Vertical gap between the selection and the toolbar.
    pub toolbar_offset: f64,
    /// HTTP request timeout.
    pub request_timeout_ms: u64,
}

impl Config {
    /// Loads the configuration from the provided loader.
    pub async fn load(loader: &impl Loader) -> Result<Self> {
        loader
            .load()
            .await
            .map_err(|e| miette!("Failed to load configuration: {e}"))
    }

    /// Saves the configuration using the provided saver.
    pub async fn save(&self, saver: &impl Saver) -> Result<()> {
        saver
            .save(self)
            .await
            .map_err(|e| miette!("Failed to save configuration: {e}"))
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, MarginaliaError> {
        Self::default().with_env()
    }

    /// Overlay values from the process environment.
    pub fn with_env(self) -> Result<Self, MarginaliaError> {
        self.overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values from any key lookup. Unset keys keep their current value.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MarginaliaError> {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(delay) = lookup(ENV_SETTLE_DELAY) {
            self.settle_delay_ms = delay.trim().parse().map_err(|_| {
                MarginaliaError::Config(format!("{ENV_SETTLE_DELAY} must be a whole number, got {delay:?}"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), MarginaliaError> {
        url::Url::parse(&self.api_url)?;
        if !self.toolbar_offset.is_finite() {
            return Err(MarginaliaError::Config("toolbar_offset must be finite".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api/v1".to_owned(),
            settle_delay_ms: 50,
            selection_delay_ms: 50,
            toolbar_offset: 50.0,
            request_timeout_ms: 30_000,
        }
    }
}

/// The trait for loading configuration data.
pub trait Loader {
    /// Loads the configuration data.
    fn load(&self) -> impl Future<Output = core::result::Result<Config, MarginaliaError>>;
}

/// The trait for saving configuration data.
pub trait Saver {
    /// Saves the configuration data.
    fn save(&self, config: &Config) -> impl Future<Output = core::result::Result<(), MarginaliaError>>;
}

/// An implementation of [`Loader`] and [`Saver`] that reads and writes a configuration file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a new [`FileStore`] with the given path.
    ///
    /// [`Config`] data is serialized by file extension; `.json` and `.toml`
    /// are supported.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }

    fn unsupported(&self) -> MarginaliaError {
        MarginaliaError::Config(format!(
            "unsupported configuration format: {}",
            self.path.display()
        ))
    }
}

impl Loader for FileStore {
    async fn load(&self) -> core::result::Result<Config, MarginaliaError> {
        let name = self.path.display().to_string();
        match self.extension() {
            Some("json") => {
                let src = std::fs::read_to_string(&self.path)?;
                serde_json::from_str(&src).map_err(|e| ParseError::json(name, src.as_str(), &e).into())
            }
            Some("toml") => {
                let src = std::fs::read_to_string(&self.path)?;
                toml::from_str(&src).map_err(|e| ParseError::toml(name, src.as_str(), &e).into())
            }
            _ => Err(self.unsupported()),
        }
    }
}

impl Saver for FileStore {
    async fn save(&self, config: &Config) -> core::result::Result<(), MarginaliaError> {
        let contents = match self.extension() {
            Some("json") => serde_json::to_string_pretty(config)?,
            Some("toml") => toml::to_string_pretty(config).map_err(SerDeError::from)?,
            _ => return Err(self.unsupported()),
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, contents)?;
        tracing::debug!(path = %self.path.display(), "saved configuration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested/config.toml"));
        let config = Config {
            api_url: "https://notes.example/api/v1".to_string(),
            settle_delay_ms: 120,
            ..Default::default()
        };
        config.save(&store).await.unwrap();
        assert_eq!(Config::load(&store).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_partial_json_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "settle_delay_ms": 10 }"#).unwrap();
        let config = Config::load(&FileStore::new(&path)).await.unwrap();
        assert_eq!(config.settle_delay_ms, 10);
        assert_eq!(config.api_url, Config::default().api_url);
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let store = FileStore::new("config.yaml");
        assert!(matches!(store.load().await, Err(MarginaliaError::Config(_))));
    }

    #[test]
    fn test_overlay_env_values() {
        let config = Config::default()
            .overlay(|key| match key {
                ENV_API_URL => Some("http://127.0.0.1:9000/api".to_string()),
                ENV_SETTLE_DELAY => Some(" 75 ".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.settle_delay_ms, 75);

        let bad = Config::default().overlay(|key| (key == ENV_SETTLE_DELAY).then(|| "soon".to_string()));
        assert!(matches!(bad, Err(MarginaliaError::Config(_))));

        let bad_url = Config::default().overlay(|key| (key == ENV_API_URL).then(|| "not a url".to_string()));
        assert!(matches!(bad_url, Err(MarginaliaError::Url(_))));
    }
}
