//! Rover SDK - BLE 小车控制与射频信号扫描
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 线上指令编码/解码
//! - **链路层** (`link`): BLE GATT 传输抽象（BlueZ / Mock）
//! - **驱动层** (`driver`): 指令队列、链路派发、执行桥、保活
//! - **控制层** (`control`): 扫描、校准、配置、状态报告
//!
//! # 快速开始
//!
//! ```rust
//! use rover_sdk::prelude::*;
//! ```

pub use rover_control as control;
pub use rover_driver as driver;
pub use rover_link as link;
pub use rover_protocol as protocol;

mod logging;
pub mod prelude;

pub use logging::init_logging;

// 常用类型
pub use rover_control::{
    ConfigStore, ControlError, PowerSampler, RoverConfig, RoverService, ScanConfig,
    ScanOrchestrator, ScanState, StatusReport,
};
pub use rover_driver::{DriverConfig, DriverError, LinkStatus, Rover, RoverBuilder};
pub use rover_link::{DeviceInfo, LinkError, Transport};
pub use rover_protocol::{Command, Direction, Motion, ProtocolError};
