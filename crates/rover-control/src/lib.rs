//! # Rover Control
//!
//! 驱动之上的控制层：
//! - 360° 信号强度扫描（[`ScanOrchestrator`]）
//! - 旋转时长校准
//! - 持久化配置（[`RoverConfig`]，TOML）
//! - 状态报告（[`StatusReport`]，JSON）
//!
//! [`RoverService`] 把这些组合成前端使用的控制面。

pub mod config;
mod error;
pub mod sampler;
pub mod scan;
mod service;
pub mod status;

pub use config::{ConfigStore, LinkSettings, RoverConfig};
pub use error::{ConfigError, ControlError};
pub use sampler::{
    IqStreamSampler, NOISE_FLOOR_DB, PowerSampler, SAMPLES_PER_READ, SamplerSlot, power_db,
    sampler_slot,
};
pub use scan::{ScanConfig, ScanOrchestrator, ScanOutcome, ScanState};
pub use service::{DEFAULT_MOVE_DURATION, MAX_CALIBRATION_SECONDS, RoverService};
pub use status::StatusReport;
