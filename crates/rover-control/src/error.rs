//! 控制层错误类型定义

use rover_driver::DriverError;
use thiserror::Error;

/// 控制层错误类型
#[derive(Error, Debug)]
pub enum ControlError {
    /// 驱动层错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 已有扫描在运行
    #[error("Scan already running")]
    ScanAlreadyRunning,

    /// 前置条件不满足（链路未连接 / SDR 未就绪）
    #[error("Not ready: {0}")]
    NotReady(&'static str),

    /// 扫描在某个角度中止（已记录的结果保留）
    #[error("Scan aborted at {angle}°: {source}")]
    ScanAborted { angle: u32, source: DriverError },

    /// 校准时长不在 0-30 秒内
    #[error("Invalid calibration duration: {0} (expected 0-30 seconds)")]
    InvalidDuration(f64),

    /// 配置读写错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 线程创建等 IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 配置文件错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_error_display() {
        let msg = ControlError::NotReady("SDR not ready").to_string();
        assert_eq!(msg, "Not ready: SDR not ready");

        let msg = ControlError::ScanAborted {
            angle: 90,
            source: DriverError::NotConnected,
        }
        .to_string();
        assert!(msg.contains("90°") && msg.contains("not connected"), "{}", msg);

        let msg = ControlError::InvalidDuration(31.0).to_string();
        assert!(msg.contains("31"));
    }

    #[test]
    fn test_scan_aborted_has_source() {
        use std::error::Error;

        let err = ControlError::ScanAborted {
            angle: 0,
            source: DriverError::ContextStopped,
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn test_driver_error_conversion() {
        let err: ControlError = DriverError::NotConnected.into();
        assert!(matches!(err, ControlError::Driver(DriverError::NotConnected)));
    }
}
