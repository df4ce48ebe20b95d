// ==========================================
// 现场工单系统 - 日志初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 级别由 RUST_LOG 控制
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// 初始化日志系统（人读格式）
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=field_work_certify=trace
///
/// # 示例
/// ```no_run
/// use field_work_certify::logging;
/// logging::init();
/// ```
pub fn init() {
    fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// 初始化日志系统（JSON 行格式，供宿主采集）
///
/// 重复初始化时返回 false
pub fn init_json() -> bool {
    fmt()
        .json()
        .with_env_filter(env_filter())
        .with_current_span(false)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// 初始化测试环境的日志系统
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
