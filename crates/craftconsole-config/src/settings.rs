use crate::paths::AppPaths;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unknown server: {0}")]
    UnknownServer(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub console: ConsoleConfig,
    pub insights: InsightsConfig,
    pub files: FilesConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub servers: Vec<ServerProfile>,
}

impl AppConfig {
    pub fn server(&self, name: &str) -> Option<&ServerProfile> {
        self.servers.iter().find(|s| s.name == name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfigLayer {
    pub console: Option<ConsoleConfigLayer>,
    pub insights: Option<InsightsConfigLayer>,
    pub files: Option<FilesConfigLayer>,
    pub transport: Option<TransportConfigLayer>,
    pub logging: Option<LoggingConfigLayer>,
    pub servers: Option<Vec<ServerProfile>>,
}

impl AppConfigLayer {
    pub fn apply_to(self, cfg: &mut AppConfig) {
        if let Some(layer) = self.console {
            cfg.console.apply(layer);
        }
        if let Some(layer) = self.insights {
            cfg.insights.apply(layer);
        }
        if let Some(layer) = self.files {
            cfg.files.apply(layer);
        }
        if let Some(layer) = self.transport {
            cfg.transport.apply(layer);
        }
        if let Some(layer) = self.logging {
            cfg.logging.apply(layer);
        }
        if let Some(servers) = self.servers {
            cfg.servers = servers;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerProfile {
    pub name: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub show_timestamp: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            show_timestamp: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ConsoleConfigLayer {
    pub show_timestamp: Option<bool>,
}

impl ConsoleConfig {
    fn apply(&mut self, layer: ConsoleConfigLayer) {
        if let Some(v) = layer.show_timestamp {
            self.show_timestamp = v;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InsightsConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 2500,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct InsightsConfigLayer {
    pub enabled: Option<bool>,
    pub interval_ms: Option<u64>,
}

impl InsightsConfig {
    fn apply(&mut self, layer: InsightsConfigLayer) {
        if let Some(v) = layer.enabled {
            self.enabled = v;
        }
        if let Some(v) = layer.interval_ms {
            self.interval_ms = v;
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListParamsStyle {
    #[default]
    Json,
    Plain,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct FilesConfig {
    pub list_params: ListParamsStyle,
    pub download_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct FilesConfigLayer {
    pub list_params: Option<ListParamsStyle>,
    pub download_dir: Option<PathBuf>,
}

impl FilesConfig {
    fn apply(&mut self, layer: FilesConfigLayer) {
        if let Some(v) = layer.list_params {
            self.list_params = v;
        }
        if layer.download_dir.is_some() {
            self.download_dir = layer.download_dir;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    pub connect_timeout_ms: u64,
    pub outbound_queue: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 15000,
            outbound_queue: 256,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct TransportConfigLayer {
    pub connect_timeout_ms: Option<u64>,
    pub outbound_queue: Option<usize>,
}

impl TransportConfig {
    fn apply(&mut self, layer: TransportConfigLayer) {
        if let Some(v) = layer.connect_timeout_ms {
            self.connect_timeout_ms = v;
        }
        if let Some(v) = layer.outbound_queue {
            self.outbound_queue = v;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            stdout: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct LoggingConfigLayer {
    pub level: Option<String>,
    pub json: Option<bool>,
    pub stdout: Option<bool>,
}

impl LoggingConfig {
    fn apply(&mut self, layer: LoggingConfigLayer) {
        if let Some(v) = layer.level {
            self.level = v;
        }
        if let Some(v) = layer.json {
            self.json = v;
        }
        if let Some(v) = layer.stdout {
            self.stdout = v;
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConfigManager {
    pub paths: AppPaths,
}

impl ConfigManager {
    pub fn new(paths: AppPaths) -> Self {
        Self { paths }
    }

    pub fn with_config_file(mut self, path: PathBuf) -> Self {
        self.paths.config_file = path;
        self
    }

    pub fn load(&self, cwd: Option<&Path>, overrides: Option<AppConfigLayer>) -> Result<AppConfig> {
        let mut cfg = AppConfig::default();

        if self.paths.config_file.exists() {
            let layer = Self::load_layer(&self.paths.config_file)?;
            layer.apply_to(&mut cfg);
        }

        if let Some(dir) = cwd {
            let project_path = AppPaths::project_config_path(dir);
            if project_path.exists() {
                let layer = Self::load_layer(&project_path)?;
                layer.apply_to(&mut cfg);
            }
        }

        if let Some(layer) = overrides {
            layer.apply_to(&mut cfg);
        }

        Ok(cfg)
    }

    pub fn load_layer(path: &Path) -> Result<AppConfigLayer> {
        let content = fs::read_to_string(path)?;
        let layer: AppConfigLayer = toml::from_str(&content)?;
        Ok(layer)
    }

    pub fn save_default(&self) -> Result<()> {
        self.save_config(&AppConfig::default())
    }

    pub fn save_config(&self, cfg: &AppConfig) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(cfg).map_err(|e| anyhow::anyhow!(e))?;
        fs::write(&self.paths.config_file, content)?;
        Ok(())
    }

    pub fn remember_password(&self, cfg: &mut AppConfig, server: &str, password: &str) -> Result<()> {
        let profile = cfg
            .servers
            .iter_mut()
            .find(|s| s.name == server)
            .ok_or_else(|| ConfigError::UnknownServer(server.to_string()))?;
        profile.password = Some(password.to_string());
        self.save_config(cfg)?;
        info!(server = %server, "remembered server password");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> ConfigManager {
        ConfigManager::new(AppPaths::with_dirs(
            dir.path().join("config"),
            dir.path().join("data"),
        ))
    }

    #[test]
    fn apply_layer_overrides() {
        let mut cfg = AppConfig::default();
        let layer = AppConfigLayer {
            logging: Some(LoggingConfigLayer {
                level: Some("debug".to_string()),
                json: Some(true),
                stdout: Some(false),
            }),
            insights: Some(InsightsConfigLayer {
                enabled: None,
                interval_ms: Some(1000),
            }),
            files: Some(FilesConfigLayer {
                list_params: Some(ListParamsStyle::Plain),
                download_dir: None,
            }),
            ..Default::default()
        };
        layer.apply_to(&mut cfg);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert!(!cfg.logging.stdout);
        assert!(cfg.insights.enabled);
        assert_eq!(cfg.insights.interval_ms, 1000);
        assert_eq!(cfg.files.list_params, ListParamsStyle::Plain);
        assert!(cfg.console.show_timestamp);
    }

    #[test]
    fn loads_servers_from_toml() {
        let layer: AppConfigLayer = toml::from_str(
            r#"
            [console]
            show_timestamp = false

            [files]
            list_params = "plain"

            [[servers]]
            name = "survival"
            uri = "ws://127.0.0.1:8080"
            password = "hunter2"
            "#,
        )
        .unwrap();
        let mut cfg = AppConfig::default();
        layer.apply_to(&mut cfg);
        assert!(!cfg.console.show_timestamp);
        assert_eq!(cfg.files.list_params, ListParamsStyle::Plain);
        let server = cfg.server("survival").unwrap();
        assert_eq!(server.uri, "ws://127.0.0.1:8080");
        assert_eq!(server.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn remember_password_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let mut cfg = AppConfig {
            servers: vec![ServerProfile {
                name: "lobby".to_string(),
                uri: "ws://lobby:8080".to_string(),
                password: None,
            }],
            ..Default::default()
        };
        manager.remember_password(&mut cfg, "lobby", "s3cret").unwrap();

        let loaded = manager.load(None, None).unwrap();
        assert_eq!(
            loaded.server("lobby").unwrap().password.as_deref(),
            Some("s3cret")
        );
    }

    #[test]
    fn remember_password_rejects_unknown_server() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let mut cfg = AppConfig::default();
        assert!(manager.remember_password(&mut cfg, "nope", "x").is_err());
        assert!(!manager.paths.config_file.exists());
    }
}
