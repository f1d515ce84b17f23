//! 命令定义和实现

pub mod calibrate;
pub mod config;
pub mod devices;
pub mod drive;
pub mod scan;

pub use calibrate::CalibrateCommand;
pub use config::ConfigCommand;
pub use devices::DevicesCommand;
pub use drive::{MoveCommand, SpeedCommand};
pub use scan::ScanCommand;
