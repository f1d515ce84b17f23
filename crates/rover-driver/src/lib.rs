//! # Rover Driver
//!
//! 小车的指令派发与双执行上下文桥接：
//! - 有界指令队列（任意线程非阻塞入队）
//! - 链路派发器（专用上下文中唯一的写入者）
//! - 执行桥（同步调用方提交异步操作并等待结果）
//! - 保活定时器
//! - 运动控制器（按键状态 → 指令）
//!
//! 大多数用户应通过 [`Rover`] 使用本 crate。

mod bridge;
mod builder;
pub mod channel;
pub mod config;
pub mod dispatcher;
mod error;
pub mod keepalive;
pub mod metrics;
pub mod motion;
mod rover;
pub mod state;

pub use bridge::{ExecutionBridge, LINK_THREAD_NAME, LinkContext};
pub use builder::RoverBuilder;
pub use channel::CommandChannel;
pub use config::DriverConfig;
pub use dispatcher::{ControlRequest, LinkDispatcher};
pub use error::DriverError;
pub use keepalive::KeepAliveTicker;
pub use metrics::{LinkMetrics, LinkMetricsSnapshot};
pub use motion::{MotionController, MotionState, SpeedUpdate, derive_command};
pub use rover::Rover;
pub use state::{LinkStatus, RoverContext};
