pub mod defaults;
pub mod dns;
pub mod hydrate;
pub mod port;
pub mod ray_common;
pub mod rule;
pub mod server;
pub mod store;
pub mod subscription;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::ray::document::Listen;
pub use store::{Doc, Store};

/// doayctl application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the engine-input JSON documents
    pub data_dir: Option<String>,

    /// none / error / warn / info / debug / trace
    pub app_log_level: String,

    /// Listen address of the local inbounds
    pub ray_host: String,

    pub ray_socks_port: u16,

    pub ray_http_port: u16,

    /// Write proxy.js next to the engine config on apply
    pub auto_setup_pac: bool,

    /// Shell command run after a successful save
    pub restart_command: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            app_log_level: "info".to_string(),
            ray_host: "127.0.0.1".to_string(),
            ray_socks_port: 1086,
            ray_http_port: 1089,
            auto_setup_pac: false,
            restart_command: None,
        }
    }
}

impl AppConfig {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        Ok(config_dir.join("doayctl").join("config.yaml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // Return default config if file doesn't exist
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_yaml::to_string(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Merge command line arguments into config
    pub fn merge_cli(&mut self, data_dir: Option<String>, log_level: Option<String>) {
        if let Some(dir) = data_dir {
            self.data_dir = Some(dir);
        }

        if let Some(level) = log_level {
            self.app_log_level = level;
        }
    }

    /// Configured data directory, or `<data_dir>/doayctl`
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => {
                let data_dir = dirs::data_dir()
                    .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
                Ok(data_dir.join("doayctl"))
            }
        }
    }

    pub fn store(&self) -> Result<Store> {
        Ok(Store::new(self.data_dir()?))
    }

    pub fn listen(&self) -> Listen {
        Listen {
            host: self.ray_host.clone(),
            socks_port: self.ray_socks_port,
            http_port: self.ray_http_port,
        }
    }

    /// `host:port` of the socks inbound, as PAC scripts expect it
    pub fn socks_proxy(&self) -> String {
        format!("{}:{}", self.ray_host, self.ray_socks_port)
    }

    /// Filter string for env_logger, `off` for `none`
    pub fn log_filter(&self) -> &str {
        match self.app_log_level.as_str() {
            "none" => "off",
            level => level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.ray_host, "127.0.0.1");
        assert_eq!(config.ray_socks_port, 1086);
        assert_eq!(config.ray_http_port, 1089);
        assert_eq!(config.app_log_level, "info");
        assert_eq!(config.socks_proxy(), "127.0.0.1:1086");
    }

    #[test]
    fn test_merge_cli() {
        let mut config = AppConfig::default();
        config.merge_cli(Some("/tmp/doay".to_string()), None);
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/doay"));
        assert_eq!(config.app_log_level, "info");

        config.merge_cli(None, Some("none".to_string()));
        assert_eq!(config.log_filter(), "off");
    }

    #[test]
    fn test_save_and_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doayctl").join("config.yaml");

        let config = AppConfig {
            ray_socks_port: 2080,
            restart_command: Some("systemctl restart xray".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);

        assert_eq!(
            AppConfig::load_from(&dir.path().join("missing.yaml")).unwrap(),
            AppConfig::default()
        );

        let partial = dir.path().join("partial.yaml");
        std::fs::write(&partial, "ray_http_port: 8080\n").unwrap();
        let loaded = AppConfig::load_from(&partial).unwrap();
        assert_eq!(loaded.ray_http_port, 8080);
        assert_eq!(loaded.ray_socks_port, 1086);
    }
}
