//! 集成测试共用的构造和等待工具

#![allow(dead_code)]

use rover_sdk::prelude::*;
use rover_sdk::link::MockTransport;
use std::thread;
use std::time::{Duration, Instant};

/// 默认的测试小车名称
pub const DEVICE_ID: &str = "AA:BB:CC:DD:EE:FF";
pub const DEVICE_NAME: &str = "JDY-16";

/// 带一台目标设备的 Mock 链路
pub fn mock_with_rover() -> MockTransport {
    MockTransport::new()
        .with_device("11:22:33:44:55:66", "speaker")
        .with_device(DEVICE_ID, DEVICE_NAME)
}

/// 关闭保活、缩短扫描时间的驱动配置
pub fn quiet_config() -> DriverConfig {
    DriverConfig {
        keepalive_enabled: false,
        scan_timeout: Duration::from_millis(10),
        ..DriverConfig::default()
    }
}

/// 轮询直到条件成立或超时，返回条件最终是否成立
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

/// 连接并等待连接时下发的 `SetSpeed` 写出，然后清空写入记录
pub fn connect_and_settle(rover: &Rover<MockTransport>, mock: &MockTransport) {
    rover.connect().expect("connect");
    assert!(
        wait_until(Duration::from_secs(2), || !mock.written_bytes().is_empty()),
        "initial speed was never written"
    );
    mock.clear_writes();
}
