//! # Rover CLI
//!
//! BLE 小车命令行工具。
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（推荐用于脚本）
//!
//! ```bash
//! # 配置默认设备名称
//! rover-cli config set --name JDY-16
//!
//! # 执行操作（内部：连接 -> 执行 -> 断开）
//! rover-cli move front --duration 1.5
//! rover-cli speed 60
//! rover-cli calibrate 2.4
//! rtl_sdr -f 433.4e6 -s 1024000 - | rover-cli scan --iq -
//! ```
//!
//! ### REPL 模式（推荐用于遥控）
//!
//! ```bash
//! $ rover-cli shell
//! rover> press w
//! rover> release w
//! rover> speed +5
//! rover> exit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod modes;
mod utils;
mod validation;

use commands::{
    CalibrateCommand, ConfigCommand, DevicesCommand, MoveCommand, ScanCommand, SpeedCommand,
};
use modes::repl::{ShellArgs, run_repl};

/// Rover CLI - BLE 小车命令行工具
#[derive(Parser, Debug)]
#[command(name = "rover-cli")]
#[command(about = "Command-line interface for BLE rover control and RF scanning", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 <config_dir>/rover/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 默认日志过滤指令（设置了 RUST_LOG 时以其为准）
    #[arg(long, global = true, default_value = utils::DEFAULT_LOG_DIRECTIVE)]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 扫描附近的 BLE 设备
    Devices(DevicesCommand),

    /// 朝指定方向运动一段时间（或立即停车）
    Move(MoveCommand),

    /// 设置速度（0-100）
    Speed(SpeedCommand),

    /// 校准一整圈的旋转时长
    Calibrate(CalibrateCommand),

    /// 360° 信号强度扫描
    Scan(ScanCommand),

    /// 启动交互式 Shell（REPL 模式）
    Shell(ShellArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    rover_sdk::init_logging(&cli.log);

    let config_path = utils::config_path(cli.config)?;

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&config_path),
        Commands::Devices(args) => args.execute(&config_path),
        Commands::Move(args) => args.execute(&config_path),
        Commands::Speed(args) => args.execute(&config_path),
        Commands::Calibrate(args) => args.execute(&config_path),
        Commands::Scan(args) => args.execute(&config_path),
        Commands::Shell(args) => run_repl(&config_path, args),
    }
}
