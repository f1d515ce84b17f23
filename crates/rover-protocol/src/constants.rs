//! 协议常量定义

/// 所有指令的前缀字符
pub const TOKEN_PREFIX: char = '%';

/// 速度指令的结束符（固件同时接受 `+`）
pub const SPEED_TERMINATOR: char = '-';

/// 速度下限
pub const SPEED_MIN: u8 = 0;

/// 速度上限
pub const SPEED_MAX: u8 = 100;

/// 连接建立后默认下发的速度
pub const DEFAULT_SPEED: u8 = 15;

/// 键盘方向键每次调整的速度步长
pub const SPEED_STEP: i64 = 5;

/// 将任意整数钳制到 `[SPEED_MIN, SPEED_MAX]`
///
/// ```
/// use rover_protocol::clamp_speed;
///
/// assert_eq!(clamp_speed(-5), 0);
/// assert_eq!(clamp_speed(60), 60);
/// assert_eq!(clamp_speed(150), 100);
/// ```
#[inline]
pub fn clamp_speed(value: i64) -> u8 {
    value.clamp(SPEED_MIN as i64, SPEED_MAX as i64) as u8
}
