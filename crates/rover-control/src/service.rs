//! 控制面
//!
//! 把驱动、扫描编排器、采样器和持久化配置组合成一组面向前端的操作：
//! 移动、调速、开始/停止扫描、校准、状态查询。

use crate::config::ConfigStore;
use crate::error::ControlError;
use crate::sampler::{PowerSampler, SamplerSlot, sampler_slot};
use crate::scan::{ScanConfig, ScanOrchestrator, ScanState};
use crate::status::StatusReport;
use rover_driver::{Rover, SpeedUpdate};
use rover_link::Transport;
use rover_protocol::{Direction, Motion};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 单次移动的默认时长
pub const DEFAULT_MOVE_DURATION: Duration = Duration::from_secs(1);

/// 校准时长上限（秒）
pub const MAX_CALIBRATION_SECONDS: f64 = 30.0;

/// 小车控制服务
pub struct RoverService<T: Transport> {
    rover: Arc<Rover<T>>,
    scan: ScanOrchestrator<T>,
    sampler: SamplerSlot,
    store: ConfigStore,
    move_duration: Duration,
}

impl<T: Transport> RoverService<T> {
    /// 创建服务
    ///
    /// 扫描的一圈旋转时长取自配置中的 `rotation_duration_seconds`。
    pub fn new(
        rover: Arc<Rover<T>>,
        store: ConfigStore,
        sampler: Option<Box<dyn PowerSampler>>,
    ) -> Self {
        let scan_config = ScanConfig {
            rotation_duration: rotation_duration(store.get().rotation_duration_seconds),
            ..ScanConfig::default()
        };
        Self::with_scan_config(rover, store, sampler, scan_config)
    }

    /// 使用指定扫描参数创建服务
    pub fn with_scan_config(
        rover: Arc<Rover<T>>,
        store: ConfigStore,
        sampler: Option<Box<dyn PowerSampler>>,
        scan_config: ScanConfig,
    ) -> Self {
        let sampler = sampler_slot(sampler);
        let scan = ScanOrchestrator::new(rover.clone(), sampler.clone(), scan_config);
        Self {
            rover,
            scan,
            sampler,
            store,
            move_duration: DEFAULT_MOVE_DURATION,
        }
    }

    /// 设置单次移动时长
    pub fn set_move_duration(&mut self, duration: Duration) {
        self.move_duration = duration;
    }

    /// 移动
    ///
    /// `Stop` 立即下发；其余方向运动 `move_duration` 后自动停车，期间阻塞调用方。
    pub fn move_to(&self, motion: Motion) -> Result<(), ControlError> {
        match motion.direction() {
            None => {
                self.rover.move_to(Motion::Stop)?;
            },
            Some(direction) => {
                info!("Move {} for {:?}", motion, self.move_duration);
                self.rover.move_for(direction, self.move_duration)?;
            },
        }
        Ok(())
    }

    /// 设置速度（钳制到 0-100），数值变化时写回配置
    pub fn set_speed(&self, value: i64) -> Result<SpeedUpdate, ControlError> {
        let update = self.rover.set_speed(value);
        if update.changed {
            self.store.update(|c| c.speed = update.speed)?;
        }
        Ok(update)
    }

    pub fn start_scan(&self) -> Result<(), ControlError> {
        self.scan.start()
    }

    /// 停止扫描，返回调用时是否在运行
    pub fn stop_scan(&self) -> bool {
        self.scan.stop()
    }

    /// 等待当前扫描结束
    pub fn wait_scan(&self) {
        self.scan.join();
    }

    pub fn scan_config(&self) -> ScanConfig {
        self.scan.config()
    }

    /// 替换扫描参数（下一次扫描生效）
    pub fn set_scan_config(&self, config: ScanConfig) {
        self.scan.set_config(config);
    }

    pub fn scan_state(&self) -> ScanState {
        self.scan.status()
    }

    /// 校准：右转 `seconds` 秒，并把该时长记为一整圈的旋转时长
    ///
    /// # 错误
    /// - `InvalidDuration`: 不在 0-30 秒内
    /// - `ScanAlreadyRunning`: 扫描进行中
    pub fn calibrate(&self, seconds: f64) -> Result<(), ControlError> {
        if !seconds.is_finite() || !(0.0..=MAX_CALIBRATION_SECONDS).contains(&seconds) {
            return Err(ControlError::InvalidDuration(seconds));
        }
        if self.scan.is_running() {
            return Err(ControlError::ScanAlreadyRunning);
        }

        info!("Calibrating: rotating right for {}s", seconds);
        self.rover
            .move_for(Direction::Right, Duration::from_secs_f64(seconds))?;

        self.store
            .update(|c| c.rotation_duration_seconds = seconds)?;
        self.scan.set_rotation_duration(rotation_duration(seconds));
        info!("Rotation duration set to {}s", seconds);
        Ok(())
    }

    /// 安装或移除采样器
    pub fn set_sampler(&self, sampler: Option<Box<dyn PowerSampler>>) {
        let ready = sampler.is_some();
        *self.sampler.lock() = sampler;
        info!("SDR {}", if ready { "ready" } else { "removed" });
    }

    pub fn sdr_ready(&self) -> bool {
        self.sampler.lock().is_some()
    }

    /// 状态报告
    ///
    /// 扫描中返回扫描线程最近一次采样；空闲时现场采样一次。
    pub fn status(&self) -> StatusReport {
        let scan = self.scan.status();
        let current_reading = if scan.running {
            self.scan.last_reading()
        } else {
            self.sampler.lock().as_mut().map(|s| s.sample_power())
        };

        StatusReport::new(
            scan,
            self.rover.is_connected(),
            self.sdr_ready(),
            current_reading,
            self.rover.speed(),
        )
    }

    pub fn rover(&self) -> &Arc<Rover<T>> {
        &self.rover
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// 关闭：停止扫描 → 断开 → 停止专用上下文
    pub fn shutdown(&self) {
        if self.scan.stop() {
            self.scan.join();
        }
        if let Err(e) = self.rover.disconnect() {
            warn!("Disconnect during shutdown failed: {}", e);
        }
        self.rover.shutdown();
    }
}

fn rotation_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::from_secs(1))
}
