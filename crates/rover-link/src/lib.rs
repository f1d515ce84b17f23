//! # Rover Link Layer
//!
//! BLE 链路抽象层，提供统一的 GATT 写入接口。
//!
//! 上层（`rover-driver`）只通过 [`Transport`] trait 访问链路，
//! 不关心底层是 BlueZ、其他平台的 BLE 库还是测试用的 Mock。
//!
//! ## 后端
//!
//! - `bluez`（feature，仅 Linux）：基于 `bluer` 的 BlueZ D-Bus 实现
//! - `mock`（feature）：记录所有写入，支持注入故障与延迟

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[cfg(all(target_os = "linux", feature = "bluez"))]
pub mod bluez;

#[cfg(all(target_os = "linux", feature = "bluez"))]
pub use bluez::{BluezHandle, BluezTransport, LinkConfig};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHandle, MockTransport};

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] LinkDeviceError),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("GATT service or characteristic not found: {0}")]
    ServiceNotFound(String),
    #[error("Link not connected")]
    NotConnected,
    #[error("Link operation timeout")]
    Timeout,
}

impl LinkError {
    /// 是否意味着链路已经不可用（需要重新连接）
    pub fn is_fatal(&self) -> bool {
        match self {
            LinkError::NotConnected => true,
            LinkError::Device(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDeviceErrorKind {
    Unknown,
    NoAdapter,
    AccessDenied,
    Busy,
    Disconnected,
    WriteRejected,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct LinkDeviceError {
    pub kind: LinkDeviceErrorKind,
    pub message: String,
}

impl LinkDeviceError {
    pub fn new(kind: LinkDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            LinkDeviceErrorKind::NoAdapter
                | LinkDeviceErrorKind::AccessDenied
                | LinkDeviceErrorKind::Disconnected
        )
    }
}

impl From<String> for LinkDeviceError {
    fn from(message: String) -> Self {
        Self::new(LinkDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for LinkDeviceError {
    fn from(message: &str) -> Self {
        Self::new(LinkDeviceErrorKind::Unknown, message)
    }
}

/// 扫描到的 BLE 设备
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// 设备标识（BlueZ 下为 MAC 地址）
    pub id: String,
    /// 广播名称（可能为空）
    pub name: Option<String>,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
        }
    }

    /// 名称是否包含给定片段（如 "JDY-16"）
    pub fn name_contains(&self, pattern: &str) -> bool {
        self.name.as_deref().is_some_and(|n| n.contains(pattern))
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => write!(f, "<unnamed> ({})", self.id),
        }
    }
}

/// BLE 传输抽象
///
/// 所有方法只会在专用执行上下文（`rover-link` 线程上的 tokio runtime）中被调用，
/// 且同一时刻只有派发器一个调用者，因此实现无需内部加锁。
///
/// `Clone` 用于专用上下文重启时重新获得一个传输实例；
/// 实现应当让克隆共享同一份底层配置。
pub trait Transport: Clone + Send + 'static {
    /// 已连接设备的句柄（由派发器独占持有）
    type Handle: Send + Sync + fmt::Debug + 'static;

    /// 专用上下文启动时的准备工作（如打开 D-Bus 会话）
    ///
    /// 在就绪信号发出之前执行；耗时超过启动超时会导致 `StartupError`。
    fn prepare(&mut self) -> impl Future<Output = Result<(), LinkError>> + Send {
        async { Ok(()) }
    }

    /// 扫描附近设备
    fn scan(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<DeviceInfo>, LinkError>> + Send;

    /// 连接设备并定位可写特征值
    fn connect(
        &mut self,
        id: &str,
    ) -> impl Future<Output = Result<Self::Handle, LinkError>> + Send;

    /// 链路是否仍然连通
    fn is_connected(&self, handle: &Self::Handle) -> impl Future<Output = bool> + Send;

    /// 写入一条指令的字节（Write Without Response）
    fn write(
        &mut self,
        handle: &Self::Handle,
        data: &[u8],
    ) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// 断开连接
    fn disconnect(
        &mut self,
        handle: Self::Handle,
    ) -> impl Future<Output = Result<(), LinkError>> + Send;
}
