//! 运动与速度命令

use crate::modes::oneshot::OneShotMode;
use crate::utils::LinkArgs;
use crate::validation::validate_seconds;
use anyhow::{Context, Result};
use clap::Args;
use rover_sdk::prelude::*;
use std::path::Path;

/// 运动命令参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 运动方向：stop / front / back / left / right（也接受 w / a / s / d）
    pub motion: Motion,

    /// 运动时长（秒），结束后自动停车
    #[arg(short, long, default_value_t = 1.0)]
    pub duration: f64,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl MoveCommand {
    pub fn execute(self, config_path: &Path) -> Result<()> {
        let duration = validate_seconds(self.duration)?;
        let mode = OneShotMode::connect(config_path, &self.link)?;

        match self.motion.direction() {
            None => {
                mode.rover().move_to(Motion::Stop).context("停车失败")?;
                println!("🛑 已停车");
            },
            Some(direction) => {
                println!("⏳ {} {:?}...", self.motion, duration);
                mode.rover()
                    .move_for(direction, duration)
                    .context("运动失败")?;
                println!("✅ 运动完成");
            },
        }
        Ok(())
    }
}

/// 速度命令参数
#[derive(Args, Debug)]
pub struct SpeedCommand {
    /// 目标速度（超出 0-100 会被钳制）
    #[arg(allow_negative_numbers = true)]
    pub value: i64,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl SpeedCommand {
    pub fn execute(self, config_path: &Path) -> Result<()> {
        let mode = OneShotMode::connect(config_path, &self.link)?;
        let update = mode.service().set_speed(self.value).context("保存速度失败")?;

        if update.speed as i64 != self.value {
            println!("⚠️  速度 {} 超出范围，已钳制为 {}", self.value, update.speed);
        }
        if update.changed {
            println!("✅ 速度设为 {}（已保存）", update.speed);
        } else {
            println!("✅ 速度保持 {}（已重新下发）", update.speed);
        }
        Ok(())
    }
}
