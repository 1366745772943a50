/// 日志工具模块
///
/// 初始化 tracing 订阅器，并提供启动与请求汇总的输出函数
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::FetchReport;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，未设置时为 `info`（verbose 时为 `debug`）。
/// 重复调用不会报错（测试中会被多次调用）。
pub fn init(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, addr: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 相册打包服务启动");
    info!("🌐 监听地址: http://{}/api/download?album=<相册地址>", addr);
    info!("🧭 浏览器模式: {:?}", config.browser_mode);
    info!("🔍 发现策略: {:?}", config.discovery_strategy);
    info!(
        "📊 下载并发: {}，间隔: {}ms，重试: {}",
        config.fetch_concurrency, config.fetch_spacing_ms, config.fetch_retries
    );
    info!("📁 暂存目录: {}", config.staging_root().display());
    info!("{}", "=".repeat(60));
}

/// 记录单个请求的处理结果
pub fn log_request_summary(request_id: &str, discovered: usize, report: &FetchReport) {
    info!("\n{}", "─".repeat(60));
    info!("[请求 {}] 📊 处理完成", request_id);
    info!("   发现: {} 张", discovered);
    info!("   下载成功: {} 张", report.staged.len());
    if !report.failures.is_empty() {
        warn!("   下载失败: {} 张", report.failures.len());
        for failure in &report.failures {
            warn!("     - #{} {}", failure.ordinal, failure.source_url);
        }
    }
    info!("{}", "─".repeat(60));
}
