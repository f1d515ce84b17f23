//! 驱动层错误类型定义

use rover_link::LinkError;
use std::time::Duration;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 链路（传输层）错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 专用上下文未能在启动超时内就绪
    #[error("Link context failed to start: {0}")]
    Startup(String),

    /// 桥接操作超时（操作本身仍在专用上下文中继续执行，结果被丢弃）
    #[error("Bridged operation timed out after {0:?}")]
    Timeout(Duration),

    /// 专用上下文已停止（关闭或异常退出）
    #[error("Link context stopped")]
    ContextStopped,

    /// 链路未连接
    #[error("Rover not connected")]
    NotConnected,

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
