//! 校准命令
//!
//! 小车原地右转指定时长；如果正好转了一整圈，该时长即为扫描使用的旋转时长。

use crate::modes::oneshot::OneShotMode;
use crate::utils::LinkArgs;
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

/// 校准命令参数
#[derive(Args, Debug)]
pub struct CalibrateCommand {
    /// 右转时长（秒，0-30）
    pub seconds: f64,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl CalibrateCommand {
    pub fn execute(self, config_path: &Path) -> Result<()> {
        let mode = OneShotMode::connect(config_path, &self.link)?;

        println!("⏳ 右转 {} 秒...", self.seconds);
        mode.service().calibrate(self.seconds).context("校准失败")?;

        println!("✅ 一圈旋转时长已保存为 {} 秒", self.seconds);
        println!("💡 如果小车没有正好转一圈，请调整时长后重新校准");
        Ok(())
    }
}
