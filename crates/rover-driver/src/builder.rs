//! Builder 模式实现
//!
//! 提供链式构造 `Rover` 实例的便捷方式。

use crate::config::DriverConfig;
use crate::rover::Rover;
use rover_link::Transport;
use std::time::Duration;

/// Rover Builder（链式构造）
///
/// # Example
///
/// ```
/// use rover_driver::RoverBuilder;
/// use rover_link::MockTransport;
/// use std::time::Duration;
///
/// let rover = RoverBuilder::new(MockTransport::new())
///     .device_name("JDY-16")
///     .initial_speed(50)
///     .keepalive_period(Duration::from_millis(100))
///     .op_timeout(Duration::from_secs(10))
///     .build();
/// assert_eq!(rover.speed(), 50);
/// ```
pub struct RoverBuilder<T: Transport> {
    transport: T,
    config: DriverConfig,
}

impl<T: Transport> RoverBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: DriverConfig::default(),
        }
    }

    /// 整体替换配置
    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// 设备名称匹配片段（默认 "JDY-16"）
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.config.device_name = name.into();
        self
    }

    /// 初始速度（会被钳制到 0-100）
    pub fn initial_speed(mut self, speed: u8) -> Self {
        self.config.initial_speed = speed;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// 是否启用保活（默认启用）
    pub fn keepalive(mut self, enabled: bool) -> Self {
        self.config.keepalive_enabled = enabled;
        self
    }

    pub fn keepalive_period(mut self, period: Duration) -> Self {
        self.config.keepalive_period = period;
        self
    }

    pub fn write_backoff(mut self, backoff: Duration) -> Self {
        self.config.write_backoff = backoff;
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.startup_timeout = timeout;
        self
    }

    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.config.op_timeout = timeout;
        self
    }

    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.config.scan_timeout = timeout;
        self
    }

    /// 构建 `Rover`（不会启动专用上下文）
    pub fn build(self) -> Rover<T> {
        Rover::new(self.transport, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_link::MockTransport;

    #[test]
    fn test_builder_applies_settings() {
        let rover = RoverBuilder::new(MockTransport::new())
            .device_name("CAR")
            .channel_capacity(4)
            .keepalive(false)
            .initial_speed(150)
            .startup_timeout(Duration::from_secs(1))
            .build();

        let config = rover.config();
        assert_eq!(config.device_name, "CAR");
        assert_eq!(config.channel_capacity, 4);
        assert!(!config.keepalive_enabled);
        assert_eq!(config.startup_timeout, Duration::from_secs(1));
        assert_eq!(rover.channel().capacity(), 4);
        // 初始速度同样被钳制
        assert_eq!(rover.speed(), 100);
        assert!(!rover.is_context_alive());
    }
}
