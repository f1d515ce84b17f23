//! 参数验证

use anyhow::{Result, bail};
use std::time::Duration;

/// 单次运动时长上限（秒）
pub const MAX_MOVE_SECONDS: f64 = 30.0;

/// 验证运动时长（0-30 秒）
pub fn validate_seconds(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || !(0.0..=MAX_MOVE_SECONDS).contains(&seconds) {
        bail!("时长必须在 0-{} 秒之间，得到 {}", MAX_MOVE_SECONDS, seconds);
    }
    Ok(Duration::from_secs_f64(seconds))
}

/// 验证扫描步长（1-360 且整除 360）
pub fn validate_step(step: u32) -> Result<u32> {
    if step == 0 || step > 360 || 360 % step != 0 {
        bail!("步长必须整除 360，得到 {}", step);
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_seconds() {
        assert_eq!(validate_seconds(1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(validate_seconds(0.0).unwrap(), Duration::ZERO);
        assert!(validate_seconds(30.0).is_ok());
        assert!(validate_seconds(-0.1).is_err());
        assert!(validate_seconds(31.0).is_err());
        assert!(validate_seconds(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_step() {
        assert_eq!(validate_step(30).unwrap(), 30);
        assert_eq!(validate_step(360).unwrap(), 360);
        assert!(validate_step(0).is_err());
        assert!(validate_step(7).is_err());
        assert!(validate_step(720).is_err());
    }
}
