//! 方向输入与运动枚举

use crate::ProtocolError;
use crate::command::Command;
use std::fmt;
use std::str::FromStr;

/// 可被"按住"的方向输入（键盘 WASD / REPL / 前端按钮）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    /// 全部方向
    pub const ALL: [Direction; 4] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
    ];

    /// WASD 键位映射
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'w' => Some(Direction::Forward),
            's' => Some(Direction::Backward),
            'a' => Some(Direction::Left),
            'd' => Some(Direction::Right),
            _ => None,
        }
    }

    /// 对应的 WASD 键
    pub fn key(self) -> char {
        match self {
            Direction::Forward => 'w',
            Direction::Backward => 's',
            Direction::Left => 'a',
            Direction::Right => 'd',
        }
    }
}

/// 控制面的运动指令（含停车）
///
/// 名称沿用前端接口：`stop` / `front` / `back` / `left` / `right`，
/// 同时接受 `forward` / `backward` 与 WASD 单字母。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Motion {
    Stop,
    Front,
    Back,
    Left,
    Right,
}

impl Motion {
    /// 对应的线上指令
    pub fn command(self) -> Command {
        match self {
            Motion::Stop => Command::Stop,
            Motion::Front => Command::Forward,
            Motion::Back => Command::Backward,
            Motion::Left => Command::Left,
            Motion::Right => Command::Right,
        }
    }

    /// 对应的方向（停车没有方向）
    pub fn direction(self) -> Option<Direction> {
        match self {
            Motion::Stop => None,
            Motion::Front => Some(Direction::Forward),
            Motion::Back => Some(Direction::Backward),
            Motion::Left => Some(Direction::Left),
            Motion::Right => Some(Direction::Right),
        }
    }
}

impl From<Direction> for Motion {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => Motion::Front,
            Direction::Backward => Motion::Back,
            Direction::Left => Motion::Left,
            Direction::Right => Motion::Right,
        }
    }
}

impl FromStr for Motion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" | "x" => Ok(Motion::Stop),
            "front" | "forward" | "w" => Ok(Motion::Front),
            "back" | "backward" | "s" => Ok(Motion::Back),
            "left" | "a" => Ok(Motion::Left),
            "right" | "d" => Ok(Motion::Right),
            other => Err(ProtocolError::UnknownMotion(other.to_string())),
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Motion::Stop => "stop",
            Motion::Front => "front",
            Motion::Back => "back",
            Motion::Left => "left",
            Motion::Right => "right",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_keys() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_key(direction.key()), Some(direction));
        }
        assert_eq!(Direction::from_key('W'), Some(Direction::Forward));
        assert_eq!(Direction::from_key('q'), None);
    }

    #[test]
    fn test_motion_parse_names_and_aliases() {
        assert_eq!("front".parse::<Motion>().unwrap(), Motion::Front);
        assert_eq!("FORWARD".parse::<Motion>().unwrap(), Motion::Front);
        assert_eq!("back".parse::<Motion>().unwrap(), Motion::Back);
        assert_eq!("d".parse::<Motion>().unwrap(), Motion::Right);
        assert_eq!(" stop ".parse::<Motion>().unwrap(), Motion::Stop);
        assert!(matches!(
            "up".parse::<Motion>(),
            Err(ProtocolError::UnknownMotion(_))
        ));
    }

    #[test]
    fn test_motion_command_mapping() {
        assert_eq!(Motion::Stop.command(), Command::Stop);
        assert_eq!(Motion::Front.command(), Command::Forward);
        assert_eq!(Motion::Back.command(), Command::Backward);
        assert_eq!(Motion::Left.command(), Command::Left);
        assert_eq!(Motion::Right.command(), Command::Right);
        assert_eq!(Motion::Stop.direction(), None);
        assert_eq!(Motion::from(Direction::Left).direction(), Some(Direction::Left));
    }

    #[test]
    fn test_motion_display_roundtrips_through_parse() {
        for motion in [Motion::Stop, Motion::Front, Motion::Back, Motion::Left, Motion::Right] {
            assert_eq!(motion.to_string().parse::<Motion>().unwrap(), motion);
        }
    }
}
