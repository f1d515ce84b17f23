//! 链路派发器
//!
//! 专用上下文中唯一的链路写入者。它独占传输层实例和连接句柄，
//! 其他组件只能通过指令队列（写入）或控制请求（连接/断开/扫描）与它交互，
//! 因此写入永远是串行的，不需要任何锁。
//!
//! 主循环：
//! - 优先处理控制请求
//! - 已连接时从队列取一条指令、编码、写入
//! - 未连接时不出队，队列中的指令在连接建立后按顺序写出

use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::keepalive::KeepAliveTicker;
use crate::state::{LinkStatus, RoverContext};
use rover_link::{DeviceInfo, LinkError, Transport};
use rover_protocol::Command;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// 派发器控制请求
#[derive(Debug)]
pub enum ControlRequest {
    /// 连接设备；`target` 为空时按名称扫描匹配
    Connect {
        target: Option<String>,
        reply: oneshot::Sender<Result<DeviceInfo, DriverError>>,
    },
    /// 断开连接（未连接时直接成功）
    Disconnect {
        reply: oneshot::Sender<Result<(), DriverError>>,
    },
    /// 扫描附近设备
    Discover {
        timeout: Duration,
        reply: oneshot::Sender<Result<Vec<DeviceInfo>, DriverError>>,
    },
    /// 断开连接并退出主循环
    Shutdown,
}

enum LinkState<H> {
    Disconnected,
    Connected { handle: H, device: DeviceInfo },
}

/// 链路派发器
pub struct LinkDispatcher<T: Transport> {
    transport: T,
    link: LinkState<T::Handle>,
    ctx: Arc<RoverContext>,
    config: DriverConfig,
    control_rx: mpsc::UnboundedReceiver<ControlRequest>,
    ticker: Option<KeepAliveTicker>,
    last_sent: Option<Command>,
}

impl<T: Transport> LinkDispatcher<T> {
    pub fn new(
        transport: T,
        ctx: Arc<RoverContext>,
        config: DriverConfig,
        control_rx: mpsc::UnboundedReceiver<ControlRequest>,
    ) -> Self {
        Self {
            transport,
            link: LinkState::Disconnected,
            ctx,
            config,
            control_rx,
            ticker: None,
            last_sent: None,
        }
    }

    /// 主循环，直到收到 `Shutdown` 或控制通道关闭
    ///
    /// 退出前断开连接（如果仍然连接）。
    pub async fn run(mut self) {
        info!("Link dispatcher started");
        loop {
            let connected = matches!(self.link, LinkState::Connected { .. });
            tokio::select! {
                biased;
                request = self.control_rx.recv() => {
                    let Some(request) = request else { break };
                    if !self.handle_control(request).await {
                        break;
                    }
                },
                cmd = self.ctx.channel.dequeue(), if connected => {
                    self.write_command(cmd).await;
                },
            }
        }

        if let Err(e) = self.disconnect_link().await {
            warn!("Disconnect during shutdown failed: {}", e);
        }
        info!("Link dispatcher stopped");
    }

    /// 处理控制请求，返回是否继续运行
    async fn handle_control(&mut self, request: ControlRequest) -> bool {
        match request {
            ControlRequest::Connect { target, reply } => {
                let result = self.connect(target).await;
                let _ = reply.send(result);
            },
            ControlRequest::Disconnect { reply } => {
                let result = self.disconnect_link().await;
                let _ = reply.send(result);
            },
            ControlRequest::Discover { timeout, reply } => {
                let result = self.transport.scan(timeout).await.map_err(DriverError::from);
                if let Ok(devices) = &result {
                    debug!("Discovered {} devices", devices.len());
                }
                let _ = reply.send(result);
            },
            ControlRequest::Shutdown => return false,
        }
        true
    }

    async fn connect(&mut self, target: Option<String>) -> Result<DeviceInfo, DriverError> {
        if let LinkState::Connected { device, .. } = &self.link {
            debug!("Already connected to {}", device);
            return Ok(device.clone());
        }

        self.ctx.publish(LinkStatus::Connecting);
        let (handle, device) = match self.establish(target).await {
            Ok(connected) => connected,
            Err(e) => {
                error!("Connect failed: {}", e);
                self.ctx.publish(LinkStatus::Disconnected);
                return Err(e);
            },
        };

        info!("Connected to {}", device);
        self.link = LinkState::Connected {
            handle,
            device: device.clone(),
        };
        self.last_sent = None;
        self.ctx.metrics.connects.fetch_add(1, Ordering::Relaxed);
        self.ctx.publish(LinkStatus::Connected {
            device: device.clone(),
        });

        // 连接建立后同步一次当前速度
        self.ctx.channel.enqueue(Command::SetSpeed(self.ctx.motion.speed()));

        if self.config.keepalive_enabled {
            self.ticker = Some(KeepAliveTicker::spawn(
                self.ctx.clone(),
                self.config.keepalive_period,
            ));
        }
        Ok(device)
    }

    async fn establish(
        &mut self,
        target: Option<String>,
    ) -> Result<(T::Handle, DeviceInfo), DriverError> {
        let devices = self.transport.scan(self.config.scan_timeout).await?;
        let device = match target {
            // 指定了设备：扫描结果只用于补全名称
            Some(id) => devices
                .into_iter()
                .find(|d| d.id == id)
                .unwrap_or_else(|| DeviceInfo::new(id, None)),
            None => devices
                .into_iter()
                .find(|d| d.name_contains(&self.config.device_name))
                .ok_or_else(|| LinkError::DeviceNotFound(self.config.device_name.clone()))?,
        };
        info!("Connecting to {}", device);
        let handle = self.transport.connect(&device.id).await?;
        Ok((handle, device))
    }

    async fn disconnect_link(&mut self) -> Result<(), DriverError> {
        self.stop_keepalive();
        let LinkState::Connected { handle, device } =
            std::mem::replace(&mut self.link, LinkState::Disconnected)
        else {
            return Ok(());
        };

        self.last_sent = None;
        self.ctx.publish(LinkStatus::Disconnected);
        match self.transport.disconnect(handle).await {
            Ok(()) => {
                info!("Disconnected from {}", device);
                Ok(())
            },
            Err(e) => {
                warn!("Disconnect from {} reported an error: {}", device, e);
                Err(e.into())
            },
        }
    }

    /// 写入一条指令
    ///
    /// 失败不重试：下一个保活周期的指令会取代它。
    async fn write_command(&mut self, cmd: Command) {
        let LinkState::Connected { handle, .. } = &self.link else {
            return;
        };

        let bytes = cmd.to_bytes();
        match self.transport.write(handle, &bytes).await {
            Ok(()) => {
                self.ctx.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
                debug!("Wrote {}", cmd);
                if self.last_sent != Some(cmd) {
                    info!("Command changed: {}", cmd);
                    self.last_sent = Some(cmd);
                }
            },
            Err(e) => {
                self.ctx.metrics.write_failures.fetch_add(1, Ordering::Relaxed);
                error!("Failed to write {}: {}", cmd, e);

                // 致命错误直接判定掉线；其余错误探测一次链路
                if !e.is_fatal() && self.transport.is_connected(handle).await {
                    tokio::time::sleep(self.config.write_backoff).await;
                } else {
                    self.link_lost();
                }
            },
        }
    }

    fn link_lost(&mut self) {
        self.stop_keepalive();
        if let LinkState::Connected { device, .. } =
            std::mem::replace(&mut self.link, LinkState::Disconnected)
        {
            warn!("Link to {} lost", device);
        }
        self.last_sent = None;
        self.ctx.metrics.link_losses.fetch_add(1, Ordering::Relaxed);
        self.ctx.publish(LinkStatus::Disconnected);
    }

    fn stop_keepalive(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_link::{LinkDeviceErrorKind, MockTransport};
    use std::time::Instant;

    struct Harness {
        ctx: Arc<RoverContext>,
        control_tx: mpsc::UnboundedSender<ControlRequest>,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn_dispatcher(transport: MockTransport, config: DriverConfig) -> Harness {
        let ctx = Arc::new(RoverContext::new(&config));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let dispatcher = LinkDispatcher::new(transport, ctx.clone(), config, control_rx);
        let task = tokio::spawn(dispatcher.run());
        Harness {
            ctx,
            control_tx,
            task,
        }
    }

    fn no_keepalive() -> DriverConfig {
        DriverConfig {
            keepalive_enabled: false,
            scan_timeout: Duration::from_millis(10),
            ..DriverConfig::default()
        }
    }

    async fn connect(h: &Harness) -> Result<DeviceInfo, DriverError> {
        let (reply, rx) = oneshot::channel();
        h.control_tx
            .send(ControlRequest::Connect {
                target: None,
                reply,
            })
            .unwrap();
        rx.await.unwrap()
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_queued_commands_written_in_order_after_connect() {
        let mock = MockTransport::new().with_device("AA", "JDY-16");
        let h = spawn_dispatcher(mock.clone(), no_keepalive());

        assert!(h.ctx.channel.enqueue(Command::Forward));
        assert!(h.ctx.channel.enqueue(Command::set_speed(60)));
        assert!(h.ctx.channel.enqueue(Command::Stop));

        // 未连接：不出队，不写入
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(mock.written_bytes().is_empty());
        assert_eq!(h.ctx.channel.len(), 3);

        let device = connect(&h).await.unwrap();
        assert_eq!(device.id, "AA");
        assert!(h.ctx.is_connected());

        wait_until(|| mock.written_tokens().len() >= 4).await;
        // 最后一条是连接后同步的速度
        assert_eq!(mock.written_tokens(), vec!["%W", "%60-", "%", "%15-"]);
    }

    #[tokio::test]
    async fn test_duplicate_commands_are_all_written() {
        let mock = MockTransport::new().with_device("AA", "JDY-16");
        let h = spawn_dispatcher(mock.clone(), no_keepalive());
        connect(&h).await.unwrap();

        for _ in 0..3 {
            h.ctx.channel.enqueue(Command::Forward);
        }
        wait_until(|| mock.written_tokens().len() >= 4).await;
        assert_eq!(
            mock.written_commands(),
            vec![
                Command::SetSpeed(15),
                Command::Forward,
                Command::Forward,
                Command::Forward
            ]
        );
        assert_eq!(h.ctx.metrics.snapshot().writes_total, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writes_never_overlap() {
        let mock = MockTransport::new()
            .with_device("AA", "JDY-16")
            .with_write_delay(Duration::from_millis(2));
        let h = spawn_dispatcher(mock.clone(), no_keepalive());
        connect(&h).await.unwrap();

        let producers: Vec<_> = (0..4)
            .map(|i| {
                let ctx = h.ctx.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        ctx.channel.enqueue(if i % 2 == 0 { Command::Left } else { Command::Right });
                        std::thread::sleep(Duration::from_millis(1));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let expected = h.ctx.metrics.snapshot().commands_enqueued as usize;
        wait_until(|| mock.written_bytes().len() >= expected).await;
        assert_eq!(mock.max_concurrent_writes(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_with_live_link_continues() {
        let mock = MockTransport::new().with_device("AA", "JDY-16");
        let h = spawn_dispatcher(
            mock.clone(),
            DriverConfig {
                write_backoff: Duration::from_millis(10),
                ..no_keepalive()
            },
        );
        connect(&h).await.unwrap();
        wait_until(|| mock.written_bytes().len() == 1).await;

        mock.fail_next_writes(1);
        h.ctx.channel.enqueue(Command::Forward);
        h.ctx.channel.enqueue(Command::Stop);

        wait_until(|| mock.written_bytes().len() == 2).await;
        // 失败的 Forward 不重试
        assert_eq!(mock.written_tokens(), vec!["%15-", "%"]);
        let metrics = h.ctx.metrics.snapshot();
        assert_eq!(metrics.write_failures, 1);
        assert_eq!(metrics.link_losses, 0);
        assert!(h.ctx.is_connected());
    }

    #[tokio::test]
    async fn test_fatal_write_error_skips_probe() {
        let mock = MockTransport::new().with_device("AA", "JDY-16");
        let h = spawn_dispatcher(mock.clone(), no_keepalive());
        connect(&h).await.unwrap();
        wait_until(|| mock.written_bytes().len() == 1).await;

        mock.fail_next_writes_with(1, LinkDeviceErrorKind::Disconnected);
        h.ctx.channel.enqueue(Command::Forward);

        wait_until(|| !h.ctx.is_connected()).await;
        assert_eq!(mock.probe_calls(), 0);
        assert_eq!(h.ctx.metrics.snapshot().link_losses, 1);
    }

    #[tokio::test]
    async fn test_transient_write_error_probes_link() {
        let mock = MockTransport::new().with_device("AA", "JDY-16");
        let h = spawn_dispatcher(
            mock.clone(),
            DriverConfig {
                write_backoff: Duration::from_millis(10),
                ..no_keepalive()
            },
        );
        connect(&h).await.unwrap();
        wait_until(|| mock.written_bytes().len() == 1).await;

        mock.fail_next_writes_with(1, LinkDeviceErrorKind::Busy);
        h.ctx.channel.enqueue(Command::Forward);
        h.ctx.channel.enqueue(Command::Stop);

        wait_until(|| mock.written_bytes().len() == 2).await;
        assert_eq!(mock.probe_calls(), 1);
        assert!(h.ctx.is_connected());
    }

    #[tokio::test]
    async fn test_link_loss_marks_disconnected() {
        let mock = MockTransport::new().with_device("AA", "JDY-16");
        let h = spawn_dispatcher(mock.clone(), DriverConfig::default());
        connect(&h).await.unwrap();
        wait_until(|| !mock.written_bytes().is_empty()).await;

        mock.drop_link();
        wait_until(|| !h.ctx.is_connected()).await;
        assert_eq!(h.ctx.link_status(), LinkStatus::Disconnected);
        assert_eq!(h.ctx.metrics.snapshot().link_losses, 1);

        // 保活已停止：队列不再被持续填充
        let before = h.ctx.metrics.snapshot().keepalive_ticks;
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(h.ctx.metrics.snapshot().keepalive_ticks, before);
    }

    #[tokio::test]
    async fn test_connect_without_matching_device() {
        let mock = MockTransport::new().with_device("BB", "headphones");
        let h = spawn_dispatcher(mock.clone(), no_keepalive());
        let err = connect(&h).await.unwrap_err();
        assert!(matches!(err, DriverError::Link(LinkError::DeviceNotFound(_))));
        assert_eq!(h.ctx.link_status(), LinkStatus::Disconnected);
        assert_eq!(mock.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_is_safe_when_not_connected() {
        let h = spawn_dispatcher(MockTransport::new(), no_keepalive());
        let (reply, rx) = oneshot::channel();
        h.control_tx.send(ControlRequest::Disconnect { reply }).unwrap();
        assert!(rx.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_and_exits() {
        let mock = MockTransport::new().with_device("AA", "JDY-16");
        let h = spawn_dispatcher(mock.clone(), DriverConfig::default());
        connect(&h).await.unwrap();

        h.control_tx.send(ControlRequest::Shutdown).unwrap();
        tokio::time::timeout(Duration::from_secs(2), h.task)
            .await
            .unwrap()
            .unwrap();
        assert!(!mock.is_link_up());
        assert_eq!(mock.disconnect_calls(), 1);
        assert_eq!(h.ctx.link_status(), LinkStatus::Disconnected);
    }
}
