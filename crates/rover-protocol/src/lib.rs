//! # Rover Protocol
//!
//! 小车串口透传协议定义（无硬件依赖）
//!
//! 小车端是一块通过 BLE 透传模块（JDY-16）接收 ASCII 指令的 Arduino，
//! 每条指令都以 `%` 开头，写入 GATT 特征值后由固件逐条解析。
//!
//! ## 模块
//!
//! - `command`: 指令类型及其线上编码/解码
//! - `motion`: 方向输入与控制面运动枚举
//! - `constants`: 协议常量
//!
//! ## 线上编码
//!
//! ```text
//! Stop      -> "%"
//! Forward   -> "%W"
//! Backward  -> "%S"
//! Left      -> "%L"
//! Right     -> "%R"
//! SetSpeed  -> "%{v}-"   (v ∈ [0, 100]，十进制)
//! ```

pub mod command;
pub mod constants;
pub mod motion;

pub use command::Command;
pub use constants::*;
pub use motion::{Direction, Motion};

use thiserror::Error;

/// 协议解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 空指令
    #[error("Empty command token")]
    Empty,

    /// 无法识别的指令
    #[error("Invalid command token: {0:?}")]
    InvalidToken(String),

    /// 无法识别的运动名称
    #[error("Unknown motion: {0:?}")]
    UnknownMotion(String),
}
