//! 工具函数

use anyhow::{Context, Result};
use clap::Args;
use rover_sdk::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

/// 默认日志过滤指令
pub const DEFAULT_LOG_DIRECTIVE: &str =
    "warn,rover_cli=info,rover_control=info,rover_driver=info,rover_link=info";

/// 一次性命令退出前等待队列写空的上限
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

#[cfg(all(target_os = "linux", feature = "bluez"))]
pub type Backend = rover_sdk::link::BluezTransport;

#[cfg(not(all(target_os = "linux", feature = "bluez")))]
pub type Backend = rover_sdk::link::MockTransport;

/// 链路参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct LinkArgs {
    /// 设备名称匹配片段
    #[arg(short, long)]
    pub name: Option<String>,

    /// 直接连接指定地址（跳过名称匹配）
    #[arg(short, long)]
    pub address: Option<String>,
}

/// 配置文件路径
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => RoverConfig::default_path().context("无法确定配置目录"),
    }
}

/// 按配置创建传输层
#[cfg(all(target_os = "linux", feature = "bluez"))]
pub fn make_transport(config: &RoverConfig) -> Backend {
    use rover_sdk::link::{BluezTransport, LinkConfig};

    BluezTransport::new(LinkConfig::from_uuid_strs(
        &config.link.service_uuid,
        &config.link.characteristic_uuid,
    ))
}

/// 按配置创建传输层（无 BlueZ 时使用模拟小车）
#[cfg(not(all(target_os = "linux", feature = "bluez")))]
pub fn make_transport(config: &RoverConfig) -> Backend {
    tracing::warn!("BlueZ backend unavailable, using a simulated rover");
    rover_sdk::link::MockTransport::new().with_device("00:00:00:00:00:00", &config.link.device_name)
}

/// 由持久化配置生成驱动配置
pub fn driver_config(config: &RoverConfig, link: &LinkArgs) -> DriverConfig {
    DriverConfig {
        device_name: link
            .name
            .clone()
            .unwrap_or_else(|| config.link.device_name.clone()),
        initial_speed: config.speed,
        ..DriverConfig::default()
    }
}
