//! 持久化配置（TOML）
//!
//! 默认位置：`<config_dir>/rover/config.toml`。文件不存在时使用默认值。

use crate::error::ConfigError;
use parking_lot::Mutex;
use rover_protocol::DEFAULT_SPEED;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 默认 BLE 服务 UUID（JDY-16 透传模块）
pub const DEFAULT_SERVICE_UUID: &str = "0000ffe0-0000-1000-8000-00805f9b34fb";
/// 默认 BLE 特征 UUID
pub const DEFAULT_CHARACTERISTIC_UUID: &str = "0000ffe3-0000-1000-8000-00805f9b34fb";

/// 小车持久化配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    /// 原地右转一整圈所需时间（秒），由校准得到
    pub rotation_duration_seconds: f64,

    /// 速度（0-100）
    pub speed: u8,

    /// 链路设置
    pub link: LinkSettings,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            rotation_duration_seconds: 1.0,
            speed: DEFAULT_SPEED,
            link: LinkSettings::default(),
        }
    }
}

/// 链路设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// 设备名称匹配片段
    pub device_name: String,
    pub service_uuid: String,
    pub characteristic_uuid: String,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            device_name: "JDY-16".to_string(),
            service_uuid: DEFAULT_SERVICE_UUID.to_string(),
            characteristic_uuid: DEFAULT_CHARACTERISTIC_UUID.to_string(),
        }
    }
}

impl RoverConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rover").join("config.toml"))
    }

    /// 从文件加载（文件不存在时返回默认配置）
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// 保存到文件（自动创建目录）
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Config saved to {}", path.display());
        Ok(())
    }
}

/// 配置存储
///
/// 持有当前配置；有路径时每次更新都会写回文件。
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    config: Mutex<RoverConfig>,
}

impl ConfigStore {
    /// 打开指定路径的配置
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = RoverConfig::load(&path)?;
        info!("Loaded config from {}", path.display());
        Ok(Self {
            path: Some(path),
            config: Mutex::new(config),
        })
    }

    /// 仅内存，不落盘
    pub fn in_memory(config: RoverConfig) -> Self {
        Self {
            path: None,
            config: Mutex::new(config),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 当前配置副本
    pub fn get(&self) -> RoverConfig {
        self.config.lock().clone()
    }

    /// 修改并保存
    ///
    /// 写文件失败时内存中的修改仍然保留。
    pub fn update(&self, f: impl FnOnce(&mut RoverConfig)) -> Result<RoverConfig, ConfigError> {
        let snapshot = {
            let mut config = self.config.lock();
            f(&mut config);
            config.clone()
        };

        if let Some(path) = &self.path {
            snapshot.save(path)?;
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let config = RoverConfig::load(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config, RoverConfig::default());
        assert_eq!(config.rotation_duration_seconds, 1.0);
        assert_eq!(config.speed, 15);
        assert_eq!(config.link.device_name, "JDY-16");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rover").join("config.toml");

        let config = RoverConfig {
            rotation_duration_seconds: 2.75,
            speed: 60,
            ..RoverConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(RoverConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "speed = 40\n").unwrap();

        let config = RoverConfig::load(&path).unwrap();
        assert_eq!(config.speed, 40);
        assert_eq!(config.rotation_duration_seconds, 1.0);
        assert_eq!(config.link, LinkSettings::default());
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "speed = \"fast\"\n").unwrap();

        assert!(matches!(RoverConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_store_update_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let store = ConfigStore::open(&path).unwrap();
        store.update(|c| c.rotation_duration_seconds = 3.5).unwrap();

        let reopened = ConfigStore::open(&path).unwrap();
        assert_eq!(reopened.get().rotation_duration_seconds, 3.5);
    }

    #[test]
    fn test_in_memory_store() {
        let store = ConfigStore::in_memory(RoverConfig::default());
        let updated = store.update(|c| c.speed = 80).unwrap();
        assert_eq!(updated.speed, 80);
        assert_eq!(store.get().speed, 80);
        assert!(store.path().is_none());
    }
}
