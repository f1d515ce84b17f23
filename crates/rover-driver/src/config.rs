//! 驱动配置

use rover_protocol::DEFAULT_SPEED;
use std::time::Duration;

/// 驱动配置
///
/// 控制指令队列、保活、专用上下文的超时等行为。
///
/// # Example
///
/// ```
/// use rover_driver::DriverConfig;
/// use std::time::Duration;
///
/// // 默认配置（队列容量 10，保活周期 100ms，桥接超时 30s）
/// let config = DriverConfig::default();
///
/// // 关闭保活、缩短桥接超时
/// let config = DriverConfig {
///     keepalive_enabled: false,
///     op_timeout: Duration::from_secs(5),
///     ..DriverConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// 指令队列容量
    ///
    /// 只有最新状态才有意义，所以队列很小；满了就丢弃。
    pub channel_capacity: usize,
    /// 是否在连接建立后启动保活
    pub keepalive_enabled: bool,
    /// 保活周期
    pub keepalive_period: Duration,
    /// 写入失败后（链路仍在）的退避时间
    pub write_backoff: Duration,
    /// 专用上下文启动（含传输层准备）超时
    pub startup_timeout: Duration,
    /// 桥接操作超时
    pub op_timeout: Duration,
    /// 关闭时等待专用线程退出的超时
    pub join_timeout: Duration,
    /// 连接前扫描设备的时长
    pub scan_timeout: Duration,
    /// 设备名称匹配片段
    pub device_name: String,
    /// 初始速度（连接建立后下发）
    pub initial_speed: u8,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 10,
            keepalive_enabled: true,
            keepalive_period: Duration::from_millis(100),
            write_backoff: Duration::from_millis(100),
            startup_timeout: Duration::from_secs(5),
            op_timeout: Duration::from_secs(30),
            join_timeout: Duration::from_secs(2),
            scan_timeout: Duration::from_secs(5),
            device_name: "JDY-16".to_string(),
            initial_speed: DEFAULT_SPEED,
        }
    }
}
