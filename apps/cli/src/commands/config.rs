//! 配置管理命令
//!
//! 用于管理持久化配置（设备名称、UUID、速度、旋转时长）

use anyhow::{Context, Result};
use clap::Subcommand;
use rover_sdk::control::{ConfigStore, RoverConfig};
use rover_sdk::protocol::clamp_speed;
use std::path::Path;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 设备名称匹配片段（如 JDY-16）
        #[arg(short, long)]
        name: Option<String>,

        /// 速度（0-100）
        #[arg(short, long)]
        speed: Option<i64>,

        /// 一整圈的旋转时长（秒）
        #[arg(short, long)]
        rotation: Option<f64>,

        /// GATT 服务 UUID
        #[arg(long)]
        service_uuid: Option<String>,

        /// 可写特征值 UUID
        #[arg(long)]
        characteristic_uuid: Option<String>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set {
                name,
                speed,
                rotation,
                service_uuid,
                characteristic_uuid,
            } => {
                if let Some(seconds) = rotation {
                    crate::validation::validate_seconds(seconds)?;
                }

                let store = ConfigStore::open(path).context("读取配置文件失败")?;
                let config = store
                    .update(|c| {
                        if let Some(name) = name {
                            c.link.device_name = name;
                        }
                        if let Some(speed) = speed {
                            c.speed = clamp_speed(speed);
                        }
                        if let Some(seconds) = rotation {
                            c.rotation_duration_seconds = seconds;
                        }
                        if let Some(uuid) = service_uuid {
                            c.link.service_uuid = uuid;
                        }
                        if let Some(uuid) = characteristic_uuid {
                            c.link.characteristic_uuid = uuid;
                        }
                    })
                    .context("写入配置文件失败")?;

                println!("✅ 配置已保存到 {}", path.display());
                print_config(&config)
            },

            ConfigCommand::Get { key } => {
                let config = RoverConfig::load(path).context("读取配置文件失败")?;
                match key.as_str() {
                    "name" => println!("{}", config.link.device_name),
                    "speed" => println!("{}", config.speed),
                    "rotation" => println!("{}", config.rotation_duration_seconds),
                    "service_uuid" => println!("{}", config.link.service_uuid),
                    "characteristic_uuid" => println!("{}", config.link.characteristic_uuid),
                    "all" => print_config(&config)?,
                    other => anyhow::bail!("未知配置项: {}", other),
                }
                Ok(())
            },

            ConfigCommand::Path => {
                println!("{}", path.display());
                Ok(())
            },
        }
    }
}

fn print_config(config: &RoverConfig) -> Result<()> {
    let content = toml::to_string_pretty(config).context("序列化配置失败")?;
    println!("{}", content.trim_end());
    Ok(())
}
