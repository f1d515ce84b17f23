//! 执行桥
//!
//! 让任意线程（同步 HTTP 处理器、扫描工作线程、CLI）把一个异步操作提交到
//! 专用上下文执行，并在有限时间内同步拿到结果。
//!
//! 专用上下文 = 名为 `rover-link` 的 std 线程 + 其上的 tokio current-thread runtime，
//! 内含三个并发任务：
//! - 链路派发器（唯一的写入者）
//! - 桥接操作执行器（一次只执行一个，按提交顺序）
//! - 保活定时器（连接期间）
//!
//! 上下文按需启动：提交操作时如果上下文不存活，先（重新）启动并等待就绪信号。

use crate::config::DriverConfig;
use crate::dispatcher::{ControlRequest, LinkDispatcher};
use crate::error::DriverError;
use crate::motion::MotionController;
use crate::state::{LinkStatus, RoverContext};
use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use rover_link::{DeviceInfo, Transport};
use rover_protocol::Command;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// 专用线程名称
pub const LINK_THREAD_NAME: &str = "rover-link";

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Job = Box<dyn FnOnce(LinkContext) -> BoxFuture + Send>;

/// 带超时的 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程负责真正的 join
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

fn on_link_thread() -> bool {
    std::thread::current().name() == Some(LINK_THREAD_NAME)
}

/// 桥接操作在专用上下文中可用的能力
#[derive(Clone)]
pub struct LinkContext {
    ctx: Arc<RoverContext>,
    control_tx: mpsc::UnboundedSender<ControlRequest>,
}

impl LinkContext {
    /// 入队一条指令
    pub fn enqueue(&self, cmd: Command) -> bool {
        self.ctx.channel.enqueue(cmd)
    }

    pub fn motion(&self) -> &MotionController {
        &self.ctx.motion
    }

    pub fn link_status(&self) -> LinkStatus {
        self.ctx.link_status()
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_connected()
    }

    /// 按配置的设备名称扫描并连接
    pub async fn connect(&self) -> Result<DeviceInfo, DriverError> {
        self.request(|reply| ControlRequest::Connect {
            target: None,
            reply,
        })
        .await
    }

    /// 连接指定设备
    pub async fn connect_to(&self, id: &str) -> Result<DeviceInfo, DriverError> {
        let target = Some(id.to_string());
        self.request(|reply| ControlRequest::Connect { target, reply }).await
    }

    pub async fn disconnect(&self) -> Result<(), DriverError> {
        self.request(|reply| ControlRequest::Disconnect { reply }).await
    }

    pub async fn discover(&self, timeout: Duration) -> Result<Vec<DeviceInfo>, DriverError> {
        self.request(|reply| ControlRequest::Discover { timeout, reply }).await
    }

    async fn request<R: Send>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<R, DriverError>>) -> ControlRequest,
    ) -> Result<R, DriverError> {
        let (reply, rx) = oneshot::channel();
        self.control_tx
            .send(make(reply))
            .map_err(|_| DriverError::ContextStopped)?;
        rx.await.map_err(|_| DriverError::ContextStopped)?
    }
}

struct ContextHandle {
    job_tx: mpsc::UnboundedSender<Job>,
    control_tx: mpsc::UnboundedSender<ControlRequest>,
    thread: JoinHandle<()>,
}

impl ContextHandle {
    fn is_alive(&self) -> bool {
        !self.thread.is_finished() && !self.job_tx.is_closed() && !self.control_tx.is_closed()
    }
}

/// 执行桥
pub struct ExecutionBridge<T: Transport> {
    /// 传输层原型，每次（重新）启动上下文时克隆一份交给派发器
    transport: Mutex<T>,
    ctx: Arc<RoverContext>,
    config: DriverConfig,
    runtime: Mutex<Option<ContextHandle>>,
}

impl<T: Transport> ExecutionBridge<T> {
    pub fn new(transport: T, ctx: Arc<RoverContext>, config: DriverConfig) -> Self {
        Self {
            transport: Mutex::new(transport),
            ctx,
            config,
            runtime: Mutex::new(None),
        }
    }

    /// 在专用上下文中执行一个操作并同步等待结果
    ///
    /// - 上下文不存活时先启动，超过 `startup_timeout` 返回 `DriverError::Startup`
    /// - 超过 `op_timeout` 返回 `DriverError::Timeout`，操作继续执行，结果被丢弃
    /// - 操作之间严格串行、按提交顺序执行
    ///
    /// 不能在专用上下文内部调用（会阻塞自身），此时返回 `DriverError::InvalidInput`。
    pub fn run<F, Fut, R>(&self, op: F) -> Result<R, DriverError>
    where
        F: FnOnce(LinkContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, DriverError>> + Send + 'static,
        R: Send + 'static,
    {
        self.run_with_timeout(self.config.op_timeout, op)
    }

    /// 与 [`run`](Self::run) 相同，但使用指定的等待上限
    pub fn run_with_timeout<F, Fut, R>(&self, timeout: Duration, op: F) -> Result<R, DriverError>
    where
        F: FnOnce(LinkContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<R, DriverError>> + Send + 'static,
        R: Send + 'static,
    {
        if on_link_thread() {
            return Err(DriverError::InvalidInput(
                "blocking bridge call from inside the link context".to_string(),
            ));
        }

        let job_tx = self.ensure_started()?;
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let job: Job = Box::new(move |link: LinkContext| -> BoxFuture {
            Box::pin(async move {
                let result = op(link).await;
                // 调用方可能已经超时离开
                let _ = result_tx.send(result);
            })
        });
        job_tx.send(job).map_err(|_| DriverError::ContextStopped)?;

        match result_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.ctx.metrics.bridged_timeouts.fetch_add(1, Ordering::Relaxed);
                warn!("Bridged operation timed out after {:?}", timeout);
                Err(DriverError::Timeout(timeout))
            },
            Err(RecvTimeoutError::Disconnected) => Err(DriverError::ContextStopped),
        }
    }

    /// 确保上下文已启动
    pub fn start(&self) -> Result<(), DriverError> {
        self.ensure_started().map(drop)
    }

    /// 上下文是否存活
    pub fn is_alive(&self) -> bool {
        self.runtime.lock().as_ref().is_some_and(ContextHandle::is_alive)
    }

    /// 关闭：断开连接 → 停止上下文 → join
    ///
    /// 幂等，可重复调用；之后再提交操作会重新启动上下文。
    pub fn shutdown(&self) {
        let Some(handle) = self.runtime.lock().take() else {
            return;
        };
        info!("Shutting down link context");
        self.stop_context(handle);
    }

    fn ensure_started(&self) -> Result<mpsc::UnboundedSender<Job>, DriverError> {
        let mut runtime = self.runtime.lock();
        if let Some(handle) = runtime.as_ref()
            && handle.is_alive()
        {
            return Ok(handle.job_tx.clone());
        }

        if let Some(stale) = runtime.take() {
            warn!("Link context is not alive, restarting");
            self.stop_context(stale);
        }

        let handle = self.spawn_context()?;
        let job_tx = handle.job_tx.clone();
        *runtime = Some(handle);
        Ok(job_tx)
    }

    fn spawn_context(&self) -> Result<ContextHandle, DriverError> {
        let transport = self.transport.lock().clone();
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let ctx = self.ctx.clone();
        let config = self.config.clone();
        let link = LinkContext {
            ctx: ctx.clone(),
            control_tx: control_tx.clone(),
        };

        let thread = std::thread::Builder::new()
            .name(LINK_THREAD_NAME.to_string())
            .spawn(move || {
                context_main(transport, ctx, config, link, job_rx, control_rx, ready_tx);
            })
            .map_err(|e| DriverError::Startup(format!("failed to spawn link thread: {}", e)))?;

        match ready_rx.recv_timeout(self.config.startup_timeout) {
            Ok(Ok(())) => {
                self.ctx.metrics.context_starts.fetch_add(1, Ordering::Relaxed);
                info!("Link context ready");
                Ok(ContextHandle {
                    job_tx,
                    control_tx,
                    thread,
                })
            },
            Ok(Err(message)) => {
                error!("Link context failed to start: {}", message);
                let _ = thread.join_timeout(self.config.join_timeout);
                Err(DriverError::Startup(message))
            },
            Err(RecvTimeoutError::Timeout) => {
                // 线程稍后发现就绪信号无人接收，会自行退出
                error!(
                    "Link context not ready within {:?}",
                    self.config.startup_timeout
                );
                Err(DriverError::Startup(format!(
                    "not ready within {:?}",
                    self.config.startup_timeout
                )))
            },
            Err(RecvTimeoutError::Disconnected) => {
                let _ = thread.join_timeout(self.config.join_timeout);
                Err(DriverError::Startup(
                    "link context exited before becoming ready".to_string(),
                ))
            },
        }
    }

    fn stop_context(&self, handle: ContextHandle) {
        let ContextHandle {
            job_tx,
            control_tx,
            thread,
        } = handle;

        // 不再接受新的桥接操作；派发器收到 Shutdown 后先断开链路再退出
        drop(job_tx);
        let _ = control_tx.send(ControlRequest::Shutdown);
        drop(control_tx);

        if on_link_thread() {
            warn!("Link context stopped from inside itself, not joining");
        } else if let Err(_e) = thread.join_timeout(self.config.join_timeout) {
            error!(
                "Link context panicked or failed to shut down within {:?}",
                self.config.join_timeout
            );
        }
        self.ctx.publish(LinkStatus::Disconnected);
    }
}

impl<T: Transport> Drop for ExecutionBridge<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 专用线程入口
fn context_main<T: Transport>(
    mut transport: T,
    ctx: Arc<RoverContext>,
    config: DriverConfig,
    link: LinkContext,
    job_rx: mpsc::UnboundedReceiver<Job>,
    control_rx: mpsc::UnboundedReceiver<ControlRequest>,
    ready_tx: crossbeam_channel::Sender<Result<(), String>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("failed to create tokio runtime: {}", e)));
            return;
        },
    };

    runtime.block_on(async move {
        if let Err(e) = transport.prepare().await {
            let _ = ready_tx.send(Err(format!("transport not ready: {}", e)));
            return;
        }
        if ready_tx.send(Ok(())).is_err() {
            warn!("Link context became ready after the caller gave up, exiting");
            return;
        }

        let dispatcher = tokio::spawn(
            LinkDispatcher::new(transport, ctx.clone(), config, control_rx).run(),
        );
        let runner = tokio::spawn(run_jobs(job_rx, link, ctx));

        if let Err(e) = dispatcher.await {
            error!("Link dispatcher terminated abnormally: {}", e);
        }
        runner.abort();
    });
    debug!("Link context exited");
}

/// 桥接操作执行器：一次一个，按提交顺序
async fn run_jobs(mut job_rx: mpsc::UnboundedReceiver<Job>, link: LinkContext, ctx: Arc<RoverContext>) {
    while let Some(job) = job_rx.recv().await {
        job(link.clone()).await;
        ctx.metrics.bridged_ops.fetch_add(1, Ordering::Relaxed);
    }
}
