//! 链路指标模块
//!
//! 原子计数器，任何线程都可以无锁读取，用于监控派发链路的健康状态。

use std::sync::atomic::{AtomicU64, Ordering};

/// 链路实时指标
///
/// # 使用示例
///
/// ```rust
/// use rover_driver::LinkMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = LinkMetrics::new();
/// metrics.writes_total.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.writes_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 成功进入队列的指令数
    pub commands_enqueued: AtomicU64,

    /// 因队列满被丢弃的指令数
    ///
    /// 负载高时增长是正常的：保活会在 100ms 内重发当前状态。
    pub commands_dropped: AtomicU64,

    /// 成功写入链路的指令数
    pub writes_total: AtomicU64,

    /// 写入失败次数
    pub write_failures: AtomicU64,

    /// 保活 tick 次数
    pub keepalive_ticks: AtomicU64,

    /// 建立连接次数
    pub connects: AtomicU64,

    /// 链路意外丢失次数（写入失败后探测到已断开）
    pub link_losses: AtomicU64,

    /// 专用上下文启动次数
    pub context_starts: AtomicU64,

    /// 已完成的桥接操作数
    pub bridged_ops: AtomicU64,

    /// 超时的桥接操作数
    pub bridged_timeouts: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> LinkMetricsSnapshot {
        LinkMetricsSnapshot {
            commands_enqueued: self.commands_enqueued.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
            writes_total: self.writes_total.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            keepalive_ticks: self.keepalive_ticks.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            link_losses: self.link_losses.load(Ordering::Relaxed),
            context_starts: self.context_starts.load(Ordering::Relaxed),
            bridged_ops: self.bridged_ops.load(Ordering::Relaxed),
            bridged_timeouts: self.bridged_timeouts.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.commands_enqueued.store(0, Ordering::Relaxed);
        self.commands_dropped.store(0, Ordering::Relaxed);
        self.writes_total.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
        self.keepalive_ticks.store(0, Ordering::Relaxed);
        self.connects.store(0, Ordering::Relaxed);
        self.link_losses.store(0, Ordering::Relaxed);
        self.context_starts.store(0, Ordering::Relaxed);
        self.bridged_ops.store(0, Ordering::Relaxed);
        self.bridged_timeouts.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkMetricsSnapshot {
    pub commands_enqueued: u64,
    pub commands_dropped: u64,
    pub writes_total: u64,
    pub write_failures: u64,
    pub keepalive_ticks: u64,
    pub connects: u64,
    pub link_losses: u64,
    pub context_starts: u64,
    pub bridged_ops: u64,
    pub bridged_timeouts: u64,
}

impl LinkMetricsSnapshot {
    /// 指令丢弃率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。没有任何指令时返回 0.0。
    pub fn drop_rate(&self) -> f64 {
        let total = self.commands_enqueued + self.commands_dropped;
        if total == 0 {
            return 0.0;
        }
        (self.commands_dropped as f64 / total as f64) * 100.0
    }

    /// 写入失败率（百分比）
    pub fn write_failure_rate(&self) -> f64 {
        let total = self.writes_total + self.write_failures;
        if total == 0 {
            return 0.0;
        }
        (self.write_failures as f64 / total as f64) * 100.0
    }
}
