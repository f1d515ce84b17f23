//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程 + crossbeam 通道：readline 阻塞在输入线程里，
//! 主线程负责执行命令；按住方向键期间由保活定时器持续下发指令。

use crate::utils::{self, Backend, LinkArgs};
use anyhow::{Context, Result, bail};
use clap::Args;
use crossbeam_channel::{Receiver, bounded};
use rover_sdk::prelude::*;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Shell 参数
#[derive(Args, Debug)]
pub struct ShellArgs {
    /// 启动后立即连接
    #[arg(long)]
    pub connect: bool,

    #[command(flatten)]
    pub link: LinkArgs,
}

/// 输入线程发给主线程的事件
#[derive(Debug)]
enum InputEvent {
    Line(String),
    Interrupted,
    Closed,
}

/// REPL 输入（专用输入线程）
struct ReplInput {
    event_rx: Receiver<InputEvent>,
    _input_thread: thread::JoinHandle<()>,
}

impl ReplInput {
    fn new() -> Result<Self> {
        let (event_tx, event_rx) = bounded::<InputEvent>(10);

        // Editor 在输入线程内创建，生命周期 = REPL 会话
        let input_thread = thread::Builder::new()
            .name("rover-repl-input".to_string())
            .spawn(move || {
                let mut rl = match DefaultEditor::new() {
                    Ok(rl) => rl,
                    Err(e) => {
                        eprintln!("Failed to initialize readline: {}", e);
                        let _ = event_tx.send(InputEvent::Closed);
                        return;
                    },
                };

                let history_path = dirs::cache_dir().map(|d| d.join("rover").join("history"));
                if let Some(path) = &history_path {
                    rl.load_history(path).ok(); // 首次运行没有历史
                }

                loop {
                    let event = match rl.readline("rover> ") {
                        Ok(line) => {
                            let line = line.trim().to_string();
                            if line.is_empty() {
                                continue;
                            }
                            let _ = rl.add_history_entry(line.as_str());
                            InputEvent::Line(line)
                        },
                        Err(ReadlineError::Interrupted) => {
                            println!("^C");
                            InputEvent::Interrupted
                        },
                        Err(ReadlineError::Eof) => InputEvent::Closed,
                        Err(err) => {
                            eprintln!("Error: {:?}", err);
                            InputEvent::Closed
                        },
                    };

                    let closed = matches!(event, InputEvent::Closed)
                        || matches!(&event, InputEvent::Line(l) if l == "exit" || l == "quit");
                    if event_tx.send(event).is_err() || closed {
                        break;
                    }
                }

                if let Some(path) = &history_path {
                    if let Some(dir) = path.parent() {
                        std::fs::create_dir_all(dir).ok();
                    }
                    rl.save_history(path).ok();
                }
            })
            .context("Failed to spawn input thread")?;

        Ok(Self {
            event_rx,
            _input_thread: input_thread,
        })
    }

    fn recv(&self) -> InputEvent {
        self.event_rx.recv().unwrap_or(InputEvent::Closed)
    }
}

/// REPL 会话（保持小车连接）
pub struct ReplSession {
    service: RoverService<Backend>,
    link: LinkArgs,
}

impl ReplSession {
    pub fn new(config_path: &Path, link: LinkArgs) -> Result<Self> {
        let store = ConfigStore::open(config_path).context("加载配置失败")?;
        let config = store.get();
        let rover = Arc::new(Rover::new(
            utils::make_transport(&config),
            utils::driver_config(&config, &link),
        ));
        Ok(Self {
            service: RoverService::new(rover, store, None),
            link,
        })
    }

    fn rover(&self) -> &Rover<Backend> {
        self.service.rover()
    }

    /// 连接（可指定地址）
    pub fn connect(&self, address: Option<&str>) -> Result<()> {
        if self.rover().is_connected() {
            println!("⚠️  已经连接");
            return Ok(());
        }

        println!("⏳ 连接小车...");
        let device = match address.or(self.link.address.as_deref()) {
            Some(address) => self.rover().connect_to(address),
            None => self.rover().connect(),
        }?;
        println!("✅ 已连接 {}", device);
        Ok(())
    }

    pub fn disconnect(&self) -> Result<()> {
        if !self.rover().is_connected() {
            println!("⚠️  未连接");
            return Ok(());
        }
        self.rover().disconnect()?;
        println!("✅ 已断开");
        Ok(())
    }

    fn check_connected(&self) -> Result<()> {
        if !self.rover().is_connected() {
            bail!("未连接，请先使用 connect 命令");
        }
        Ok(())
    }

    /// 急停：松开所有方向键并立即下发停车
    pub fn emergency_stop(&self) {
        self.rover().emergency_stop();
    }

    pub fn status(&self) -> String {
        let motion = self.rover().motion().snapshot();
        format!(
            "{} | speed {} | {} | command {}",
            self.rover().link_status(),
            motion.speed,
            if motion.reversed { "reversed" } else { "normal" },
            motion.current_command()
        )
    }

    pub fn shutdown(&self) {
        self.service.shutdown();
    }
}

/// 运行 REPL 模式
pub fn run_repl(config_path: &Path, args: ShellArgs) -> Result<()> {
    let session = ReplSession::new(config_path, args.link)?;
    if args.connect
        && let Err(err) = session.connect(None)
    {
        eprintln!("❌ Error: {}", err);
    }

    let input = ReplInput::new()?;
    println!("Rover CLI v{} - 交互式 Shell", env!("CARGO_PKG_VERSION"));
    println!("输入 'help' 查看帮助，'exit' 退出，Ctrl+C 急停");
    println!();

    loop {
        match input.recv() {
            InputEvent::Interrupted => {
                session.emergency_stop();
                eprintln!("🛑 Emergency stop activated!");
            },
            InputEvent::Closed => break,
            InputEvent::Line(line) => match line.as_str() {
                "exit" | "quit" => {
                    println!("👋 再见！");
                    break;
                },
                "help" => print_help(),
                "status" => println!("📊 {}", session.status()),
                _ => {
                    if let Err(err) = handle_command(&line, &session) {
                        eprintln!("❌ Error: {}", err);
                    }
                },
            },
        }
    }

    session.shutdown();
    Ok(())
}

/// 解析方向参数（front/back/left/right 或 w/a/s/d）
fn parse_direction(arg: Option<&str>) -> Result<Direction> {
    let arg = arg.context("缺少方向参数")?;
    let motion: Motion = arg.parse()?;
    motion
        .direction()
        .with_context(|| format!("'{}' 不是方向", arg))
}

/// 处理命令
fn handle_command(line: &str, session: &ReplSession) -> Result<()> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&command) = parts.first() else {
        return Ok(());
    };

    match command {
        "connect" => session.connect(parts.get(1).copied())?,

        "disconnect" => session.disconnect()?,

        "devices" => {
            let devices = session.rover().discover(Duration::from_secs(5))?;
            for device in devices {
                println!("  {}", device);
            }
        },

        "press" => {
            session.check_connected()?;
            let direction = parse_direction(parts.get(1).copied())?;
            session.rover().motion().press(direction);
            println!("➡️  {}", session.rover().motion().current_command());
        },

        "release" => {
            let motion = session.rover().motion();
            match parts.get(1).copied() {
                None | Some("all") => motion.release_all(),
                arg => {
                    motion.release(parse_direction(arg)?);
                },
            }
            println!("➡️  {}", motion.current_command());
        },

        "reverse" => {
            let reversed = session.rover().motion().toggle_reversed();
            println!("🔄 {}", if reversed { "倒车模式" } else { "正常模式" });
        },

        "speed" => {
            let arg = parts.get(1).context("缺少速度参数")?;
            let update = if arg.starts_with('+') || arg.starts_with('-') {
                let delta: i64 = arg.parse().context("无效的速度增量")?;
                let target = session.rover().speed() as i64 + delta;
                session.service.set_speed(target)?
            } else {
                session.service.set_speed(arg.parse().context("无效的速度")?)?
            };
            println!("⚡ 速度 {}", update.speed);
        },

        "move" => {
            let motion: Motion = parts.get(1).context("缺少方向参数")?.parse()?;
            match parts.get(2) {
                Some(seconds) => {
                    let duration = crate::validation::validate_seconds(
                        seconds.parse().context("无效的时长")?,
                    )?;
                    match motion.direction() {
                        Some(direction) => session.rover().move_for(direction, duration)?,
                        None => {
                            session.rover().move_to(Motion::Stop)?;
                        },
                    }
                },
                None => {
                    session.rover().move_to(motion)?;
                },
            }
            println!("➡️  {}", session.rover().motion().current_command());
        },

        "stop" => {
            session.emergency_stop();
            println!("🛑 已停车");
        },

        _ => bail!("未知命令: {}（输入 help 查看帮助）", command),
    }

    Ok(())
}

fn print_help() {
    println!("可用命令:");
    println!("  connect [address]     连接小车（默认按名称匹配）");
    println!("  disconnect            断开连接");
    println!("  devices               扫描附近设备");
    println!("  press <dir>           按下方向键（w/a/s/d 或 front/back/left/right）");
    println!("  release [dir|all]     松开方向键");
    println!("  reverse               切换倒车模式（交换左右）");
    println!("  speed <n|+n|-n>       设置/调整速度（0-100）");
    println!("  move <motion> [secs]  运动（带时长时结束后自动停车）");
    println!("  stop                  急停");
    println!("  status                显示状态");
    println!("  exit / quit           退出");
}
