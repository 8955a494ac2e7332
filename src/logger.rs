//! 日志初始化
//!
//! `RUST_LOG` 优先；未设置时 `verbose` 决定默认级别（debug / info）

use tracing_subscriber::EnvFilter;

/// 初始化全局日志订阅器，重复调用是安全的
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
