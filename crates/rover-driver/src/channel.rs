//! 指令队列
//!
//! 有界 MPSC 队列：任意线程非阻塞入队，专用上下文中唯一的派发器异步出队。
//!
//! 队列本身（crossbeam 有界通道）独立于专用上下文存在，
//! 上下文重启后仍是同一个队列，已入队的指令不会丢失。

use crate::metrics::LinkMetrics;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use rover_protocol::Command;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::Notify;
use tracing::{trace, warn};

/// 指令队列
///
/// # Example
///
/// ```
/// use rover_driver::{CommandChannel, LinkMetrics};
/// use rover_protocol::Command;
/// use std::sync::Arc;
///
/// let channel = CommandChannel::new(2, Arc::new(LinkMetrics::new()));
/// assert!(channel.enqueue(Command::Forward));
/// assert!(channel.enqueue(Command::Stop));
/// // 满了：丢弃并返回 false
/// assert!(!channel.enqueue(Command::Left));
/// assert_eq!(channel.try_dequeue(), Some(Command::Forward));
/// ```
#[derive(Debug)]
pub struct CommandChannel {
    tx: Sender<Command>,
    rx: Receiver<Command>,
    notify: Notify,
    capacity: usize,
    metrics: Arc<LinkMetrics>,
}

impl CommandChannel {
    /// 创建队列（容量至少为 1）
    pub fn new(capacity: usize, metrics: Arc<LinkMetrics>) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self {
            tx,
            rx,
            notify: Notify::new(),
            capacity,
            metrics,
        }
    }

    /// 非阻塞入队
    ///
    /// 队列满时丢弃指令并返回 `false`。这不是错误：保活很快会重发当前状态。
    pub fn enqueue(&self, cmd: Command) -> bool {
        match self.tx.try_send(cmd) {
            Ok(()) => {
                self.metrics.commands_enqueued.fetch_add(1, Ordering::Relaxed);
                self.notify.notify_one();
                trace!("Enqueued {}", cmd);
                true
            },
            Err(TrySendError::Full(cmd)) => {
                self.metrics.commands_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Command queue full (capacity {}), dropping {}", self.capacity, cmd);
                false
            },
            // 队列自身持有接收端，不会断开
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// 异步出队（FIFO）
    ///
    /// 队列为空时挂起，直到有新指令入队。可以安全地放在 `select!` 中被取消，
    /// 取消不会丢失指令。
    pub async fn dequeue(&self) -> Command {
        loop {
            if let Ok(cmd) = self.rx.try_recv() {
                return cmd;
            }
            self.notify.notified().await;
        }
    }

    /// 非阻塞出队
    pub fn try_dequeue(&self) -> Option<Command> {
        self.rx.try_recv().ok()
    }

    /// 丢弃队列中所有指令，返回丢弃的数量
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.rx.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
