//! Configuration service for vls

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::config::{FeatureSet, IndexingMode, VlsConfig};

#[async_trait]
pub trait ConfigService: Send + Sync {
    async fn load(&self) -> Result<VlsConfig, ConfigError>;
    fn config_path(&self) -> PathBuf;
}

pub struct DefaultConfigService {
    global: PathBuf,
    overlay: Option<PathBuf>,
}

impl DefaultConfigService {
    /// Global config plus an optional `--config` file layered on top
    pub fn new(overlay: Option<&Path>) -> Self {
        Self {
            global: Self::global_config_path(),
            overlay: overlay.map(Path::to_path_buf),
        }
    }

    pub fn with_global_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global = path.into();
        self
    }

    fn global_config_path() -> PathBuf {
        // XDG standard: ~/.config/vls/config.toml
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vls")
            .join("config.toml")
    }

    async fn read_layer(path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(path).await?;
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Merge the config files, without environment overrides
    pub async fn load_files(&self) -> Result<VlsConfig, ConfigError> {
        let mut config = VlsConfig::default();

        if let Some(layer) = Self::read_layer(&self.global).await? {
            config = layer.apply(config);
        }

        if let Some(path) = &self.overlay {
            if !path.exists() {
                return Err(ConfigError::InvalidValue {
                    key: "config".to_string(),
                    message: format!("Config file does not exist: {}", path.display()),
                });
            }
            if let Some(layer) = Self::read_layer(path).await? {
                config = layer.apply(config);
            }
        }

        Ok(config)
    }
}

#[async_trait]
impl ConfigService for DefaultConfigService {
    async fn load(&self) -> Result<VlsConfig, ConfigError> {
        let config = self.load_files().await?;
        apply_env_overrides(config, |key| std::env::var(key).ok())
    }

    fn config_path(&self) -> PathBuf {
        self.global.clone()
    }
}

/// One config file: only the keys it sets override the layer below
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    features: Option<FeatureSet>,
    debug: Option<bool>,
    log_path: Option<PathBuf>,
    vroot: Option<PathBuf>,
    indexing: Option<IndexingMode>,
    target_os: Option<String>,
}

impl ConfigLayer {
    fn apply(self, mut config: VlsConfig) -> VlsConfig {
        if let Some(features) = self.features {
            config.features = features;
        }
        if let Some(debug) = self.debug {
            config.debug = debug;
        }
        if self.log_path.is_some() {
            config.log_path = self.log_path;
        }
        if self.vroot.is_some() {
            config.vroot = self.vroot;
        }
        if let Some(indexing) = self.indexing {
            config.indexing = indexing;
        }
        if self.target_os.is_some() {
            config.target_os = self.target_os;
        }
        config
    }
}

pub const ENV_DEBUG: &str = "VLS_DEBUG";
pub const ENV_VROOT: &str = "VROOT";
pub const ENV_LOG_PATH: &str = "VLS_LOG_PATH";

fn apply_env_overrides<F>(mut config: VlsConfig, var: F) -> Result<VlsConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = var(ENV_DEBUG) {
        config.debug = parse_bool(&val).ok_or_else(|| ConfigError::InvalidValue {
            key: ENV_DEBUG.to_string(),
            message: format!("expected a boolean, got '{}'", val),
        })?;
    }
    if let Some(val) = var(ENV_VROOT)
        && !val.is_empty()
    {
        config.vroot = Some(PathBuf::from(val));
    }
    if let Some(val) = var(ENV_LOG_PATH)
        && !val.is_empty()
    {
        config.log_path = Some(PathBuf::from(val));
    }
    Ok(config)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
