//! 小车驱动（对外 API）

use crate::bridge::{ExecutionBridge, LinkContext};
use crate::channel::CommandChannel;
use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::metrics::LinkMetricsSnapshot;
use crate::motion::{MotionController, SpeedUpdate};
use crate::state::{LinkStatus, RoverContext};
use rover_link::{DeviceInfo, Transport};
use rover_protocol::{Command, Direction, Motion};
use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 小车驱动
///
/// 持有共享状态和执行桥；可以 `Arc` 共享给任意多个线程。
/// Drop 时按"断开 → 停止上下文 → join"的顺序关闭。
///
/// # Example
///
/// ```no_run
/// use rover_driver::RoverBuilder;
/// use rover_link::MockTransport;
/// use rover_protocol::Direction;
/// use std::time::Duration;
///
/// let rover = RoverBuilder::new(MockTransport::new().with_device("AA", "JDY-16")).build();
/// rover.connect()?;
/// rover.set_speed(60);
/// rover.move_for(Direction::Forward, Duration::from_secs(1))?;
/// rover.shutdown();
/// # Ok::<(), rover_driver::DriverError>(())
/// ```
pub struct Rover<T: Transport> {
    ctx: Arc<RoverContext>,
    bridge: ExecutionBridge<T>,
    config: DriverConfig,
}

impl<T: Transport> Rover<T> {
    pub fn new(transport: T, config: DriverConfig) -> Self {
        let ctx = Arc::new(RoverContext::new(&config));
        let bridge = ExecutionBridge::new(transport, ctx.clone(), config.clone());
        Self {
            ctx,
            bridge,
            config,
        }
    }

    /// 启动专用上下文（可选，首次桥接操作会自动启动）
    pub fn start(&self) -> Result<(), DriverError> {
        self.bridge.start()
    }

    /// 按配置的设备名称扫描并连接
    pub fn connect(&self) -> Result<DeviceInfo, DriverError> {
        self.bridge.run(|link| async move { link.connect().await })
    }

    /// 连接指定设备
    pub fn connect_to(&self, id: &str) -> Result<DeviceInfo, DriverError> {
        let id = id.to_string();
        self.bridge.run(move |link| async move { link.connect_to(&id).await })
    }

    /// 断开连接（上下文未启动时直接返回）
    pub fn disconnect(&self) -> Result<(), DriverError> {
        if !self.bridge.is_alive() {
            return Ok(());
        }
        self.bridge.run(|link| async move { link.disconnect().await })
    }

    /// 扫描附近设备
    pub fn discover(&self, timeout: Duration) -> Result<Vec<DeviceInfo>, DriverError> {
        self.bridge
            .run(move |link| async move { link.discover(timeout).await })
    }

    /// 立即发送一条运动指令并记录为当前意图
    ///
    /// 返回指令是否成功入队（队列满时为 `false`，保活会补发）。
    pub fn move_to(&self, motion: impl Into<Motion>) -> Result<bool, DriverError> {
        if !self.is_connected() {
            return Err(DriverError::NotConnected);
        }
        Ok(self.ctx.motion.move_to(motion))
    }

    /// 朝指定方向运动一段时间后停车
    ///
    /// 作为一个桥接操作执行：与其他桥接操作互斥，对调用方而言是原子的。
    /// 等待上限为 `duration + op_timeout`。
    pub fn move_for(&self, direction: Direction, duration: Duration) -> Result<(), DriverError> {
        let timeout = duration.saturating_add(self.config.op_timeout);
        self.bridge.run_with_timeout(timeout, move |link| async move {
            if !link.is_connected() {
                return Err(DriverError::NotConnected);
            }
            debug!("Moving {:?} for {:?}", direction, duration);
            link.motion().move_to(direction);
            tokio::time::sleep(duration).await;
            link.motion().move_to(Motion::Stop);
            Ok(())
        })
    }

    /// 紧急停车
    ///
    /// 松开全部按键并把运动意图置为停车，保活随后只会补发 `Stop`；
    /// 进行中的 `move_for` 照常等到时长结束才返回。未连接时同样可调用。
    pub fn emergency_stop(&self) -> bool {
        self.ctx.motion.stop()
    }

    /// 设置速度（钳制到 0-100，总是下发）
    pub fn set_speed(&self, value: i64) -> SpeedUpdate {
        self.ctx.motion.set_speed(value)
    }

    /// 调整速度
    pub fn adjust_speed(&self, delta: i64) -> SpeedUpdate {
        self.ctx.motion.adjust_speed(delta)
    }

    pub fn speed(&self) -> u8 {
        self.ctx.motion.speed()
    }

    /// 直接入队一条指令
    pub fn enqueue(&self, cmd: Command) -> bool {
        self.ctx.channel.enqueue(cmd)
    }

    /// 等待已入队的指令全部处理完（写出或写失败）
    ///
    /// 返回是否在超时前完成；链路未连接时队列不会被消费，立即返回 `false`。
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let m = self.ctx.metrics.snapshot();
            if self.ctx.channel.is_empty() && m.writes_total + m.write_failures >= m.commands_enqueued
            {
                return true;
            }
            if !self.is_connected() || Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// 在专用上下文中执行任意操作
    pub fn run<F, Fut, R>(&self, op: F) -> Result<R, DriverError>
    where
        F: FnOnce(LinkContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, DriverError>> + Send + 'static,
        R: Send + 'static,
    {
        self.bridge.run(op)
    }

    pub fn motion(&self) -> &MotionController {
        &self.ctx.motion
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.ctx.channel
    }

    pub fn link_status(&self) -> LinkStatus {
        self.ctx.link_status()
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_connected()
    }

    pub fn metrics(&self) -> LinkMetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 专用上下文是否存活
    pub fn is_context_alive(&self) -> bool {
        self.bridge.is_alive()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// 关闭（幂等）
    pub fn shutdown(&self) {
        info!("Rover shutting down");
        self.bridge.shutdown();
    }
}
