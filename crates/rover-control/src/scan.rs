//! 360° 信号强度扫描
//!
//! 扫描流程（每一步）：
//! 1. 桥接执行 `move_for(Right, rotation_per_step)`（结束后自动停车）
//! 2. 在测量窗口内持续采样功率
//! 3. 把均值（保留两位小数）记录到当前角度，角度前进一步
//! 4. 短暂停顿让车身稳定
//!
//! 扫描运行在独立的工作线程中；桥接操作失败时中止扫描，已记录的结果保留。

use crate::error::ControlError;
use crate::sampler::SamplerSlot;
use parking_lot::Mutex;
use rover_driver::Rover;
use rover_link::Transport;
use rover_protocol::Direction;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 扫描工作线程名称
pub const SCAN_THREAD_NAME: &str = "rover-scan";

/// 扫描参数
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// 每步旋转角度（应能整除 360）
    pub step_degrees: u32,

    /// 每个角度的测量窗口
    pub measurement_window: Duration,

    /// 两次采样之间的间隔
    pub sample_interval: Duration,

    /// 每步结束后的停顿
    pub settle_pause: Duration,

    /// 右转一整圈所需时间（校准结果）
    pub rotation_duration: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            step_degrees: 30,
            measurement_window: Duration::from_millis(500),
            sample_interval: Duration::from_millis(10),
            settle_pause: Duration::from_millis(100),
            rotation_duration: Duration::from_secs(1),
        }
    }
}

impl ScanConfig {
    /// 一次扫描的步数
    pub fn steps(&self) -> u32 {
        360 / self.step_degrees.clamp(1, 360)
    }

    /// 每一步的旋转时长
    pub fn rotation_per_step(&self) -> Duration {
        self.rotation_duration
            .mul_f64(self.step_degrees.clamp(1, 360) as f64 / 360.0)
    }
}

/// 扫描结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcome {
    Completed,
    Stopped,
    Aborted,
}

/// 扫描状态快照
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanState {
    pub running: bool,
    /// 下一次测量将记录到的角度
    pub current_angle: u32,
    /// 角度 → 平均功率（dB）
    pub results: BTreeMap<u32, f64>,
    pub last_error: Option<String>,
    /// 最近一次扫描的结束方式（运行中为 `None`）
    pub outcome: Option<ScanOutcome>,
}

/// 扫描编排器
///
/// 同一时刻最多一个扫描在运行。`status()` 在任意线程返回一致的快照。
pub struct ScanOrchestrator<T: Transport> {
    rover: Arc<Rover<T>>,
    sampler: SamplerSlot,
    config: Mutex<ScanConfig>,
    state: Arc<Mutex<ScanState>>,
    stop_flag: Arc<AtomicBool>,
    last_reading: Arc<Mutex<Option<f64>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> ScanOrchestrator<T> {
    pub fn new(rover: Arc<Rover<T>>, sampler: SamplerSlot, config: ScanConfig) -> Self {
        Self {
            rover,
            sampler,
            config: Mutex::new(config),
            state: Arc::new(Mutex::new(ScanState::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            last_reading: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
        }
    }

    /// 开始扫描
    ///
    /// # 错误
    /// - `ScanAlreadyRunning`: 已有扫描在运行
    /// - `NotReady`: 链路未连接或 SDR 未就绪
    pub fn start(&self) -> Result<(), ControlError> {
        let mut worker = self.worker.lock();

        {
            let mut state = self.state.lock();
            if state.running {
                return Err(ControlError::ScanAlreadyRunning);
            }
            if !self.rover.is_connected() {
                return Err(ControlError::NotReady("rover not connected"));
            }
            if self.sampler.lock().is_none() {
                return Err(ControlError::NotReady("SDR not ready"));
            }
            *state = ScanState {
                running: true,
                ..ScanState::default()
            };
        }

        // 上一次扫描的线程已经结束（running == false），回收即可
        if let Some(previous) = worker.take() {
            let _ = previous.join();
        }
        self.stop_flag.store(false, Ordering::SeqCst);

        let job = ScanJob {
            rover: self.rover.clone(),
            sampler: self.sampler.clone(),
            config: self.config.lock().clone(),
            state: self.state.clone(),
            stop_flag: self.stop_flag.clone(),
            last_reading: self.last_reading.clone(),
        };

        let spawned = thread::Builder::new()
            .name(SCAN_THREAD_NAME.to_string())
            .spawn(move || job.run());

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            },
            Err(e) => {
                error!("Failed to spawn scan worker: {}", e);
                let mut state = self.state.lock();
                state.running = false;
                state.last_error = Some(e.to_string());
                Err(ControlError::Io(e))
            },
        }
    }

    /// 请求停止（在两步之间生效）
    ///
    /// 返回调用时是否有扫描在运行。
    pub fn stop(&self) -> bool {
        let running = self.state.lock().running;
        if running {
            info!("Scan stop requested");
            self.stop_flag.store(true, Ordering::SeqCst);
        }
        running
    }

    /// 等待当前扫描结束
    pub fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("Scan worker panicked");
            self.state.lock().running = false;
        }
    }

    /// 状态快照
    pub fn status(&self) -> ScanState {
        self.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// 最近一次采样值
    pub fn last_reading(&self) -> Option<f64> {
        *self.last_reading.lock()
    }

    pub fn config(&self) -> ScanConfig {
        self.config.lock().clone()
    }

    /// 替换扫描参数（下一次扫描生效）
    pub fn set_config(&self, config: ScanConfig) {
        *self.config.lock() = config;
    }

    /// 更新一圈旋转时长（下一次扫描生效）
    pub fn set_rotation_duration(&self, duration: Duration) {
        self.config.lock().rotation_duration = duration;
    }

    pub fn rover(&self) -> &Arc<Rover<T>> {
        &self.rover
    }
}

impl<T: Transport> Drop for ScanOrchestrator<T> {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

/// 工作线程持有的扫描任务
struct ScanJob<T: Transport> {
    rover: Arc<Rover<T>>,
    sampler: SamplerSlot,
    config: ScanConfig,
    state: Arc<Mutex<ScanState>>,
    stop_flag: Arc<AtomicBool>,
    last_reading: Arc<Mutex<Option<f64>>>,
}

/// 工作线程异常退出（采样器 panic 等）时把状态收尾为 `Aborted`
struct RunGuard {
    state: Arc<Mutex<ScanState>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.running {
            error!("Scan worker exited abnormally at {}°", state.current_angle);
            state.running = false;
            state.outcome = Some(ScanOutcome::Aborted);
            state.last_error = Some("scan worker panicked".to_string());
        }
    }
}

impl<T: Transport> ScanJob<T> {
    fn run(self) {
        let _guard = RunGuard {
            state: self.state.clone(),
        };
        let steps = self.config.steps();
        let step = 360 / steps;
        let rotation = self.config.rotation_per_step();
        info!(
            "Scan started: {} steps of {}°, {:?} rotation per step",
            steps, step, rotation
        );

        let mut outcome = ScanOutcome::Completed;
        for i in 0..steps {
            if self.stop_flag.load(Ordering::SeqCst) {
                info!("Scan stopped after {} steps", i);
                outcome = ScanOutcome::Stopped;
                break;
            }

            let angle = i * step;
            if let Err(e) = self.rover.move_for(Direction::Right, rotation) {
                let err = ControlError::ScanAborted { angle, source: e };
                error!("{}", err);
                self.state.lock().last_error = Some(err.to_string());
                outcome = ScanOutcome::Aborted;
                break;
            }

            let Some(mean) = self.measure() else {
                let err = ControlError::NotReady("SDR not ready");
                warn!("Scan aborted at {}°: {}", angle, err);
                self.state.lock().last_error = Some(err.to_string());
                outcome = ScanOutcome::Aborted;
                break;
            };

            let value = round2(mean);
            debug!("Scan {}° → {} dB", angle, value);
            {
                let mut state = self.state.lock();
                state.results.insert(angle, value);
                state.current_angle = angle + step;
            }

            thread::sleep(self.config.settle_pause);
        }

        let mut state = self.state.lock();
        state.running = false;
        state.outcome = Some(outcome);
        info!(
            "Scan finished ({:?}) with {} results",
            outcome,
            state.results.len()
        );
    }

    /// 在测量窗口内采样并返回均值（至少一个样本）
    ///
    /// 采样器被移除时返回 `None`。
    fn measure(&self) -> Option<f64> {
        let deadline = Instant::now() + self.config.measurement_window;
        let mut sum = 0.0;
        let mut count = 0u32;

        loop {
            let reading = self.sampler.lock().as_mut().map(|s| s.sample_power())?;
            *self.last_reading.lock() = Some(reading);
            sum += reading;
            count += 1;

            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(self.config.sample_interval);
        }

        Some(sum / count as f64)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
