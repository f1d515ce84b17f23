//! 共享状态
//!
//! - `LinkStatus`：对外发布的链路状态快照（ArcSwap，无锁读取）
//! - `RoverContext`：调用方线程与专用上下文共享的全部状态
//!
//! 传输层句柄本身只存在于派发器内部，这里只发布它的描述。

use crate::channel::CommandChannel;
use crate::config::DriverConfig;
use crate::metrics::LinkMetrics;
use crate::motion::MotionController;
use arc_swap::ArcSwap;
use rover_link::DeviceInfo;
use std::fmt;
use std::sync::Arc;

/// 链路状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected {
        device: DeviceInfo,
    },
}

impl LinkStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkStatus::Connected { .. })
    }

    /// 已连接设备
    pub fn device(&self) -> Option<&DeviceInfo> {
        match self {
            LinkStatus::Connected { device } => Some(device),
            _ => None,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Disconnected => f.write_str("disconnected"),
            LinkStatus::Connecting => f.write_str("connecting"),
            LinkStatus::Connected { device } => write!(f, "connected to {}", device),
        }
    }
}

/// 共享状态上下文
///
/// 由 `Rover` 创建，`Arc` 共享给专用上下文中的派发器、保活和桥接操作。
#[derive(Debug)]
pub struct RoverContext {
    /// 指令队列
    pub channel: Arc<CommandChannel>,
    /// 运动控制器
    pub motion: Arc<MotionController>,
    /// 链路状态（派发器写，任意线程读）
    pub status: ArcSwap<LinkStatus>,
    /// 指标
    pub metrics: Arc<LinkMetrics>,
}

impl RoverContext {
    pub fn new(config: &DriverConfig) -> Self {
        let metrics = Arc::new(LinkMetrics::new());
        let channel = Arc::new(CommandChannel::new(config.channel_capacity, metrics.clone()));
        let motion = Arc::new(MotionController::new(channel.clone(), config.initial_speed));
        Self {
            channel,
            motion,
            status: ArcSwap::from_pointee(LinkStatus::Disconnected),
            metrics,
        }
    }

    /// 当前链路状态
    pub fn link_status(&self) -> LinkStatus {
        self.status.load().as_ref().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.load().is_connected()
    }

    pub(crate) fn publish(&self, status: LinkStatus) {
        self.status.store(Arc::new(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_status_display() {
        assert_eq!(LinkStatus::Disconnected.to_string(), "disconnected");
        let status = LinkStatus::Connected {
            device: DeviceInfo::new("AA", Some("JDY-16")),
        };
        assert_eq!(status.to_string(), "connected to JDY-16 (AA)");
        assert!(status.is_connected());
        assert_eq!(status.device().map(|d| d.id.as_str()), Some("AA"));
        assert!(!LinkStatus::Connecting.is_connected());
    }

    #[test]
    fn test_context_shares_channel_with_motion() {
        let ctx = RoverContext::new(&DriverConfig::default());
        assert!(ctx.motion.move_to(rover_protocol::Motion::Front));
        assert_eq!(ctx.channel.len(), 1);
        assert_eq!(ctx.metrics.snapshot().commands_enqueued, 1);
        assert_eq!(ctx.motion.speed(), 15);
    }

    #[test]
    fn test_publish_status() {
        let ctx = RoverContext::new(&DriverConfig::default());
        assert_eq!(ctx.link_status(), LinkStatus::Disconnected);
        ctx.publish(LinkStatus::Connecting);
        assert_eq!(ctx.link_status(), LinkStatus::Connecting);
        assert!(!ctx.is_connected());
    }
}
