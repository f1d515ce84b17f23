//! 指令类型定义模块
//!
//! `Command` 是值类型：每个 tick / 每次调用创建一次，被派发器消费一次。

use crate::ProtocolError;
use crate::constants::*;
use crate::motion::Direction;
use std::fmt;

/// 小车指令
///
/// 相等性是结构相等，`SetSpeed(60) == SetSpeed(60)`。
///
/// # 示例
///
/// ```
/// use rover_protocol::Command;
///
/// assert_eq!(Command::Forward.encode(), "%W");
/// assert_eq!(Command::set_speed(150).encode(), "%100-");
/// assert_eq!(Command::decode("%60-").unwrap(), Command::SetSpeed(60));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// 停车
    Stop,
    /// 前进
    Forward,
    /// 后退
    Backward,
    /// 原地左转
    Left,
    /// 原地右转
    Right,
    /// 设置速度（0-100）
    SetSpeed(u8),
}

impl Command {
    /// 构造速度指令，超出范围的值会被钳制到 `[0, 100]`
    #[inline]
    pub fn set_speed(value: i64) -> Self {
        Command::SetSpeed(clamp_speed(value))
    }

    /// 是否为运动指令（非速度指令）
    pub fn is_motion(&self) -> bool {
        !matches!(self, Command::SetSpeed(_))
    }

    /// 编码为线上 ASCII token
    ///
    /// `SetSpeed` 的负载在写入前再次钳制，保证线上永远不会出现超过 100 的速度。
    pub fn encode(&self) -> String {
        match self {
            Command::Stop => TOKEN_PREFIX.to_string(),
            Command::Forward => format!("{TOKEN_PREFIX}W"),
            Command::Backward => format!("{TOKEN_PREFIX}S"),
            Command::Left => format!("{TOKEN_PREFIX}L"),
            Command::Right => format!("{TOKEN_PREFIX}R"),
            Command::SetSpeed(v) => {
                format!("{TOKEN_PREFIX}{}{SPEED_TERMINATOR}", clamp_speed(*v as i64))
            },
        }
    }

    /// 编码为待写入 GATT 特征值的字节
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().into_bytes()
    }

    /// 解析线上 token
    ///
    /// 与固件的解析规则保持一致：
    /// - 必须以 `%` 开头
    /// - `%` 后紧跟数字时，数字部分为速度，最后一个字符为指令字母（`-` 或 `+`）
    /// - 否则 `%` 后的第一个字符为指令字母
    pub fn decode(token: &str) -> Result<Self, ProtocolError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ProtocolError::Empty);
        }

        let rest = token
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| ProtocolError::InvalidToken(token.to_string()))?;

        if rest.is_empty() {
            return Ok(Command::Stop);
        }

        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            let digits = rest
                .strip_suffix([SPEED_TERMINATOR, '+'])
                .ok_or_else(|| ProtocolError::InvalidToken(token.to_string()))?;
            let value: i64 = digits
                .parse()
                .map_err(|_| ProtocolError::InvalidToken(token.to_string()))?;
            return Ok(Command::set_speed(value));
        }

        match rest {
            "W" => Ok(Command::Forward),
            "S" => Ok(Command::Backward),
            "L" => Ok(Command::Left),
            "R" => Ok(Command::Right),
            _ => Err(ProtocolError::InvalidToken(token.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<Direction> for Command {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => Command::Forward,
            Direction::Backward => Command::Backward,
            Direction::Left => Command::Left,
            Direction::Right => Command::Right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_motion_tokens() {
        assert_eq!(Command::Stop.encode(), "%");
        assert_eq!(Command::Forward.encode(), "%W");
        assert_eq!(Command::Backward.encode(), "%S");
        assert_eq!(Command::Left.encode(), "%L");
        assert_eq!(Command::Right.encode(), "%R");
    }

    #[test]
    fn test_encode_speed_token() {
        assert_eq!(Command::SetSpeed(0).encode(), "%0-");
        assert_eq!(Command::SetSpeed(60).encode(), "%60-");
        assert_eq!(Command::SetSpeed(100).encode(), "%100-");
        assert_eq!(Command::SetSpeed(60).to_bytes(), b"%60-".to_vec());
    }

    #[test]
    fn test_set_speed_clamps() {
        assert_eq!(Command::set_speed(-5), Command::SetSpeed(0));
        assert_eq!(Command::set_speed(150), Command::SetSpeed(100));
        assert_eq!(Command::set_speed(42), Command::SetSpeed(42));
    }

    #[test]
    fn test_raw_speed_payload_clamped_on_encode() {
        // 直接构造越界负载时，编码依然不会超出 100
        assert_eq!(Command::SetSpeed(250).encode(), "%100-");
    }

    #[test]
    fn test_decode_known_tokens() {
        assert_eq!(Command::decode("%").unwrap(), Command::Stop);
        assert_eq!(Command::decode("%W").unwrap(), Command::Forward);
        assert_eq!(Command::decode("%S").unwrap(), Command::Backward);
        assert_eq!(Command::decode("%L").unwrap(), Command::Left);
        assert_eq!(Command::decode("%R").unwrap(), Command::Right);
        assert_eq!(Command::decode("%15-").unwrap(), Command::SetSpeed(15));
        // 固件同样接受 '+' 结束符
        assert_eq!(Command::decode("%15+").unwrap(), Command::SetSpeed(15));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(Command::decode(""), Err(ProtocolError::Empty));
        assert!(matches!(Command::decode("W"), Err(ProtocolError::InvalidToken(_))));
        assert!(matches!(Command::decode("%X"), Err(ProtocolError::InvalidToken(_))));
        assert!(matches!(Command::decode("%60W"), Err(ProtocolError::InvalidToken(_))));
        assert!(matches!(Command::decode("%6"), Err(ProtocolError::InvalidToken(_))));
        assert!(matches!(Command::decode("%-"), Err(ProtocolError::InvalidToken(_))));
    }

    #[test]
    fn test_decode_rejects_multibyte_tail() {
        assert!(matches!(Command::decode("%1é"), Err(ProtocolError::InvalidToken(_))));
        assert!(matches!(Command::decode("%12é-"), Err(ProtocolError::InvalidToken(_))));
        assert!(matches!(Command::decode("%Wé"), Err(ProtocolError::InvalidToken(_))));
    }

    #[test]
    fn test_display_matches_encode() {
        assert_eq!(format!("{}", Command::SetSpeed(7)), "%7-");
        assert_eq!(format!("{}", Command::Left), "%L");
    }

    #[test]
    fn test_from_direction() {
        assert_eq!(Command::from(Direction::Forward), Command::Forward);
        assert_eq!(Command::from(Direction::Right), Command::Right);
        assert!(Command::from(Direction::Left).is_motion());
        assert!(!Command::SetSpeed(1).is_motion());
    }

    proptest! {
        #[test]
        fn prop_speed_token_always_in_range(value in any::<i64>()) {
            let cmd = Command::set_speed(value);
            let decoded = Command::decode(&cmd.encode()).unwrap();
            match decoded {
                Command::SetSpeed(v) => prop_assert!(v <= SPEED_MAX),
                other => prop_assert!(false, "unexpected command {:?}", other),
            }
        }

        /// 任意输入都只会得到 Ok 或 Err，不会 panic
        #[test]
        fn prop_decode_is_total(token in ".*") {
            let _ = Command::decode(&token);
        }
    }
}
