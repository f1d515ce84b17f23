//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 安装全局日志订阅者
///
/// - 输出：`tracing-subscriber` fmt 格式
/// - 过滤：优先读取 `RUST_LOG`，否则使用 `default_directive`（如 `"rover=info"`）
/// - `log` 记录（bluer 等依赖）通过 `tracing-log` 转发
///
/// 重复调用是安全的，返回是否由本次调用完成安装。
pub fn init_logging(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }

    // 其他库可能已经接管了 `log`，此时只使用 tracing
    let _ = tracing_log::LogTracer::init();
    true
}
