//! Configuration management for the RaiderHub console

use raiderhub_core::{ClientConfig, NotificationConfig, DEFAULT_API_URL};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ui: UiConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub api_url: String,
    #[serde(default)]
    pub ws_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    pub show_timestamps: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                api_url: DEFAULT_API_URL.to_string(),
                ws_url: None,
            },
            ui: UiConfig {
                show_timestamps: true,
            },
            notifications: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn path(data_dir: &Path) -> std::path::PathBuf {
        data_dir.join("config.json")
    }

    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let config_path = Self::path(data_dir);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Self = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, data_dir: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::path(data_dir), content)?;
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.server.api_url);
        config.ws_url = self.server.ws_url.clone();
        config.notifications = self.notifications.clone();
        config
    }
}
