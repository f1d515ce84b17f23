//! Mock 传输实现
//!
//! 无硬件依赖，用于单元测试和集成测试：
//! - 记录每一次成功写入的字节
//! - 可注入写入失败、连接失败、链路掉线
//! - 可注入写入/启动延迟
//! - 统计并发写入的最大深度（用于验证"同一时刻最多一条指令在途"）

use crate::{DeviceInfo, LinkDeviceError, LinkDeviceErrorKind, LinkError, Transport};
use parking_lot::Mutex;
use rover_protocol::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<DeviceInfo>,
    connected: Option<u64>,
    next_session: u64,
    writes: Vec<Vec<u8>>,
    fail_writes: usize,
    fail_kind: Option<LinkDeviceErrorKind>,
    fail_connect: bool,
    write_delay: Duration,
    prepare_delay: Duration,
    prepare_calls: usize,
    connect_calls: usize,
    disconnect_calls: usize,
    probe_calls: usize,
}

/// Mock 连接句柄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockHandle {
    pub id: String,
    session: u64,
}

/// Mock 传输
///
/// 克隆共享同一份内部状态，测试代码保留一份克隆用于断言。
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockTransport {
    /// 创建空的 Mock（扫描不到任何设备）
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一个可被扫描到的设备
    pub fn with_device(self, id: &str, name: &str) -> Self {
        self.state.lock().devices.push(DeviceInfo::new(id, Some(name)));
        self
    }

    /// 每次写入前等待的时间
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.state.lock().write_delay = delay;
        self
    }

    /// `prepare()` 的耗时（用于模拟专用上下文启动缓慢）
    pub fn with_prepare_delay(self, delay: Duration) -> Self {
        self.state.lock().prepare_delay = delay;
        self
    }

    /// 接下来 `n` 次写入返回错误（`WriteRejected`，链路仍然连通）
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_next_writes_with(n, LinkDeviceErrorKind::WriteRejected);
    }

    /// 接下来 `n` 次写入返回指定类型的设备错误
    pub fn fail_next_writes_with(&self, n: usize, kind: LinkDeviceErrorKind) {
        let mut state = self.state.lock();
        state.fail_writes = n;
        state.fail_kind = Some(kind);
    }

    /// 之后的连接请求是否失败
    pub fn set_fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    /// 模拟远端掉线
    pub fn drop_link(&self) {
        self.state.lock().connected = None;
    }

    /// 链路当前是否连通
    pub fn is_link_up(&self) -> bool {
        self.state.lock().connected.is_some()
    }

    /// 所有成功写入的原始字节
    pub fn written_bytes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// 所有成功写入的 token（按写入顺序）
    pub fn written_tokens(&self) -> Vec<String> {
        self.state
            .lock()
            .writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// 所有成功写入并能被解析的指令
    pub fn written_commands(&self) -> Vec<Command> {
        self.written_tokens()
            .iter()
            .filter_map(|t| Command::decode(t).ok())
            .collect()
    }

    /// 清空写入记录
    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    pub fn prepare_calls(&self) -> usize {
        self.state.lock().prepare_calls
    }

    pub fn connect_calls(&self) -> usize {
        self.state.lock().connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().disconnect_calls
    }

    /// `is_connected` 被调用的次数
    pub fn probe_calls(&self) -> usize {
        self.state.lock().probe_calls
    }

    /// 观测到的最大并发写入数（正确的派发器应当永远是 1）
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    type Handle = MockHandle;

    async fn prepare(&mut self) -> Result<(), LinkError> {
        let delay = {
            let mut state = self.state.lock();
            state.prepare_calls += 1;
            state.prepare_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn scan(&mut self, _timeout: Duration) -> Result<Vec<DeviceInfo>, LinkError> {
        Ok(self.state.lock().devices.clone())
    }

    async fn connect(&mut self, id: &str) -> Result<MockHandle, LinkError> {
        let mut state = self.state.lock();
        state.connect_calls += 1;

        if state.fail_connect {
            return Err(LinkError::Device(LinkDeviceError::new(
                LinkDeviceErrorKind::Busy,
                "mock connect failure",
            )));
        }
        if !state.devices.iter().any(|d| d.id == id) {
            return Err(LinkError::DeviceNotFound(id.to_string()));
        }

        state.next_session += 1;
        let session = state.next_session;
        state.connected = Some(session);
        Ok(MockHandle {
            id: id.to_string(),
            session,
        })
    }

    async fn is_connected(&self, handle: &MockHandle) -> bool {
        let mut state = self.state.lock();
        state.probe_calls += 1;
        state.connected == Some(handle.session)
    }

    async fn write(&mut self, handle: &MockHandle, data: &[u8]) -> Result<(), LinkError> {
        let depth = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(depth, Ordering::SeqCst);

        let delay = self.state.lock().write_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = self.state.lock();
            if state.connected != Some(handle.session) {
                Err(LinkError::NotConnected)
            } else if state.fail_writes > 0 {
                state.fail_writes -= 1;
                Err(LinkError::Device(LinkDeviceError::new(
                    state.fail_kind.unwrap_or(LinkDeviceErrorKind::WriteRejected),
                    "mock write failure",
                )))
            } else {
                state.writes.push(data.to_vec());
                Ok(())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn disconnect(&mut self, handle: MockHandle) -> Result<(), LinkError> {
        let mut state = self.state.lock();
        state.disconnect_calls += 1;
        if state.connected == Some(handle.session) {
            state.connected = None;
        }
        Ok(())
    }
}
