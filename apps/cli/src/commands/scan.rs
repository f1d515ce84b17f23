//! 信号强度扫描命令
//!
//! 采样源为 rtl-sdr 原始 IQ 字节流（交织的 8 位无符号样本），例如：
//!
//! ```bash
//! rtl_sdr -f 433.4e6 -s 1024000 - | rover-cli scan --iq -
//! ```

use crate::modes::oneshot::OneShotMode;
use crate::utils::LinkArgs;
use crate::validation::{validate_seconds, validate_step};
use anyhow::{Context, Result, bail};
use clap::Args;
use rover_sdk::control::{IqStreamSampler, PowerSampler, ScanOutcome};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// 扫描命令参数
#[derive(Args, Debug)]
pub struct ScanCommand {
    /// IQ 数据源文件（`-` 表示标准输入）
    #[arg(long)]
    pub iq: PathBuf,

    /// 每步旋转角度
    #[arg(long, default_value_t = 30)]
    pub step: u32,

    /// 每个角度的测量窗口（秒）
    #[arg(long, default_value_t = 0.5)]
    pub window: f64,

    /// 以 JSON 输出状态报告
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl ScanCommand {
    fn open_sampler(&self) -> Result<Box<dyn PowerSampler>> {
        if self.iq.as_os_str() == "-" {
            return Ok(Box::new(IqStreamSampler::new(io::stdin())));
        }
        let file = File::open(&self.iq)
            .with_context(|| format!("打开 IQ 数据源失败: {}", self.iq.display()))?;
        Ok(Box::new(IqStreamSampler::new(BufReader::new(file))))
    }

    pub fn execute(self, config_path: &Path) -> Result<()> {
        let step = validate_step(self.step)?;
        let window = validate_seconds(self.window)?;
        let sampler = self.open_sampler()?;

        let mode = OneShotMode::connect(config_path, &self.link)?;
        let service = mode.service();

        let mut scan_config = service.scan_config();
        scan_config.step_degrees = step;
        scan_config.measurement_window = window;
        service.set_scan_config(scan_config.clone());
        service.set_sampler(Some(sampler));

        println!(
            "⏳ 扫描开始：{} 步，每步 {}°，一圈 {:?}",
            scan_config.steps(),
            step,
            scan_config.rotation_duration
        );
        service.start_scan().context("无法开始扫描")?;

        let mut reported = 0;
        loop {
            let state = service.scan_state();
            for (angle, value) in state.results.iter().skip(reported) {
                println!("  {:>3}°  {:>8.2} dB", angle, value);
            }
            reported = state.results.len();
            if !state.running {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
        service.wait_scan();

        let state = service.scan_state();
        if self.json {
            println!("{}", service.status().to_json()?);
        } else if let Some((angle, value)) = state
            .results
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
        {
            println!("📍 最强信号: {}° ({:.2} dB)", angle, value);
        }

        match state.outcome {
            Some(ScanOutcome::Completed) => println!("✅ 扫描完成"),
            Some(ScanOutcome::Stopped) if mode.is_interrupted() => println!("🛑 扫描已中断"),
            Some(ScanOutcome::Stopped) => println!("🛑 扫描已停止"),
            _ => bail!(
                "扫描中止: {}",
                state.last_error.as_deref().unwrap_or("unknown error")
            ),
        }
        Ok(())
    }
}
