//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use rover_sdk::prelude::*;
//! ```

// 驱动层
pub use rover_driver::{DriverConfig, LinkStatus, Rover, RoverBuilder, SpeedUpdate};

// 控制层
pub use rover_control::{
    ConfigStore, PowerSampler, RoverConfig, RoverService, ScanConfig, ScanState, StatusReport,
};

// 协议与链路
pub use rover_link::{DeviceInfo, Transport};
pub use rover_protocol::{Command, Direction, Motion};

// 错误类型
pub use rover_control::ControlError;
pub use rover_driver::DriverError;
pub use rover_link::LinkError;
pub use rover_protocol::ProtocolError;
