//! 保活定时器
//!
//! 接收端固件有指令超时看门狗：一段时间收不到指令就会停车。
//! 连接期间每个周期重新推导当前指令并入队，按住按键时小车才能持续运动。

use crate::state::RoverContext;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// 保活定时器（专用上下文中的独立任务）
///
/// 必须在 tokio runtime 内创建。Drop 时任务被中止。
#[derive(Debug)]
pub struct KeepAliveTicker {
    handle: JoinHandle<()>,
}

impl KeepAliveTicker {
    /// 启动保活任务
    pub fn spawn(ctx: Arc<RoverContext>, period: Duration) -> Self {
        debug!("Keep-alive started ({:?})", period);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                ctx.metrics.keepalive_ticks.fetch_add(1, Ordering::Relaxed);
                let (cmd, enqueued) = ctx.motion.resend_current();
                // 入队失败只丢掉本次 tick，下一个周期照常
                if !enqueued {
                    trace!("Keep-alive tick dropped ({})", cmd);
                }
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// 停止保活
    pub fn stop(self) {
        // 由 Drop 中止任务
        debug!("Keep-alive stopped");
    }
}

impl Drop for KeepAliveTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
