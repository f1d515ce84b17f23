//! 执行桥集成测试
//!
//! 验证双执行上下文的核心约束：
//! 1. 桥接操作在专用上下文中串行执行
//! 2. 启动失败不触碰传输层
//! 3. 关闭幂等，关闭后可重新启动
//! 4. 超时的操作不影响后续操作

mod common;

use common::*;
use rover_sdk::driver::LINK_THREAD_NAME;
use rover_sdk::link::MockTransport;
use rover_sdk::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_bridged_ops_from_many_threads_are_serialized() {
    let rover = Arc::new(Rover::new(mock_with_rover(), quiet_config()));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let rover = rover.clone();
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            thread::spawn(move || {
                for _ in 0..3 {
                    let in_flight = in_flight.clone();
                    let max_in_flight = max_in_flight.clone();
                    let name = rover
                        .run(move |_link| async move {
                            let depth = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            max_in_flight.fetch_max(depth, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(3)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            Ok(thread::current().name().map(str::to_string))
                        })
                        .unwrap();
                    assert_eq!(name.as_deref(), Some(LINK_THREAD_NAME));
                }
            })
        })
        .collect();
    for c in callers {
        c.join().unwrap();
    }

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    // 计数在结果送回之后才更新
    assert!(wait_until(Duration::from_secs(1), || rover.metrics().bridged_ops == 12));
    assert_eq!(rover.metrics().context_starts, 1);
}

#[test]
fn test_startup_timeout_has_no_transport_side_effects() {
    let mock = mock_with_rover().with_prepare_delay(Duration::from_millis(400));
    let config = DriverConfig {
        startup_timeout: Duration::from_millis(50),
        ..quiet_config()
    };
    let rover = Rover::new(mock.clone(), config);

    let err = rover.connect().unwrap_err();
    assert!(matches!(err, DriverError::Startup(_)), "{:?}", err);
    assert!(!rover.is_context_alive());

    // 等迟到的上下文自行退出
    thread::sleep(Duration::from_millis(500));
    assert_eq!(mock.connect_calls(), 0);
    assert!(mock.written_bytes().is_empty());
    assert!(!rover.is_connected());
}

#[test]
fn test_shutdown_is_idempotent_and_restartable() {
    let mock = mock_with_rover();
    let rover = Rover::new(mock.clone(), quiet_config());
    connect_and_settle(&rover, &mock);

    rover.shutdown();
    rover.shutdown();
    assert!(!rover.is_context_alive());
    assert!(!mock.is_link_up());
    assert_eq!(mock.disconnect_calls(), 1);

    // 关闭后的首个桥接操作重新启动上下文
    let devices = rover.discover(Duration::from_millis(10)).unwrap();
    assert_eq!(devices.len(), 2);
    assert!(rover.is_context_alive());
    assert_eq!(rover.metrics().context_starts, 2);
    rover.shutdown();
}

#[test]
fn test_timed_out_move_does_not_block_later_ops() {
    let mock = mock_with_rover();
    let config = DriverConfig {
        op_timeout: Duration::from_millis(50),
        ..quiet_config()
    };
    let rover = Rover::new(mock.clone(), config);
    connect_and_settle(&rover, &mock);

    let slow = rover.run(|_link| async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    });
    assert!(matches!(slow, Err(DriverError::Timeout(_))));
    assert_eq!(rover.metrics().bridged_timeouts, 1);

    // 超时的操作仍在上下文中执行，等它结束
    thread::sleep(Duration::from_millis(200));

    // move_for 的等待上限是 duration + op_timeout
    rover
        .move_for(Direction::Left, Duration::from_millis(60))
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        mock.written_tokens() == vec!["%L", "%"]
    }));
    rover.shutdown();
}

#[test]
fn test_drop_shuts_down_context() {
    let mock = mock_with_rover();
    {
        let rover = Rover::new(mock.clone(), quiet_config());
        connect_and_settle(&rover, &mock);
        assert!(mock.is_link_up());
    }
    assert!(!mock.is_link_up());
    assert_eq!(mock.disconnect_calls(), 1);
}

#[test]
fn test_context_reports_disconnected_transport() {
    let rover = Rover::new(MockTransport::new(), quiet_config());
    let connected = rover.run(|link| async move { Ok(link.is_connected()) }).unwrap();
    assert!(!connected);
}
