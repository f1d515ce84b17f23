//! 设备扫描命令

use crate::modes::oneshot::OneShotMode;
use crate::utils::LinkArgs;
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use std::time::Duration;

/// 设备扫描参数
#[derive(Args, Debug)]
pub struct DevicesCommand {
    /// 扫描时长（秒）
    #[arg(short, long, default_value_t = 5.0)]
    pub timeout: f64,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl DevicesCommand {
    pub fn execute(self, config_path: &Path) -> Result<()> {
        let timeout = crate::validation::validate_seconds(self.timeout)?;
        let mode = OneShotMode::open(config_path, &self.link)?;
        let pattern = mode.rover().config().device_name.clone();

        println!("⏳ 扫描 {:?}...", timeout);
        let devices = mode
            .rover()
            .discover(timeout.max(Duration::from_millis(100)))
            .context("扫描失败")?;

        if devices.is_empty() {
            println!("⚠️  未发现设备");
            return Ok(());
        }

        println!("📡 发现 {} 个设备:", devices.len());
        for device in &devices {
            let marker = if device.name_contains(&pattern) { "  ← 匹配" } else { "" };
            println!("  {}{}", device, marker);
        }
        Ok(())
    }
}
