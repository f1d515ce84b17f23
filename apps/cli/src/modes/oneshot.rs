//! One-shot 模式
//!
//! 加载配置 → 连接 → 执行单个命令 → 写空队列 → 断开。

use crate::utils::{self, Backend, FLUSH_TIMEOUT, LinkArgs};
use anyhow::{Context, Result};
use rover_sdk::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot 会话
pub struct OneShotMode {
    service: Arc<RoverService<Backend>>,
    interrupted: Arc<AtomicBool>,
}

impl OneShotMode {
    /// 创建会话（不连接）
    ///
    /// 同时安装 Ctrl+C 处理：停止扫描并立即停车。
    pub fn open(config_path: &Path, link: &LinkArgs) -> Result<Self> {
        let store = ConfigStore::open(config_path).context("加载配置失败")?;
        let config = store.get();

        let rover = Arc::new(Rover::new(
            utils::make_transport(&config),
            utils::driver_config(&config, link),
        ));
        let service = Arc::new(RoverService::new(rover, store, None));
        let interrupted = Arc::new(AtomicBool::new(false));

        {
            let service = service.clone();
            let interrupted = interrupted.clone();
            ctrlc::set_handler(move || {
                eprintln!("\n🛑 收到 Ctrl+C，停车...");
                interrupted.store(true, Ordering::SeqCst);
                service.stop_scan();
                service.rover().emergency_stop();
            })
            .context("安装 Ctrl+C 处理器失败")?;
        }

        Ok(Self {
            service,
            interrupted,
        })
    }

    /// 创建会话并连接
    pub fn connect(config_path: &Path, link: &LinkArgs) -> Result<Self> {
        let mode = Self::open(config_path, link)?;

        println!("⏳ 连接小车...");
        let rover = mode.rover();
        let device = match &link.address {
            Some(address) => rover.connect_to(address),
            None => rover.connect(),
        }
        .context("连接失败")?;
        println!("✅ 已连接 {}", device);

        Ok(mode)
    }

    pub fn service(&self) -> &RoverService<Backend> {
        &self.service
    }

    pub fn rover(&self) -> &Rover<Backend> {
        self.service.rover()
    }

    /// 是否收到过 Ctrl+C
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl Drop for OneShotMode {
    fn drop(&mut self) {
        if self.rover().is_connected() && !self.rover().flush(FLUSH_TIMEOUT) {
            eprintln!("⚠️  部分指令未能在断开前写出");
        }
        self.service.shutdown();
    }
}
