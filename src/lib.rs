// ==========================================
// 现场工单系统 - 核心库
// ==========================================
// 范围: 设备分配 / 保存校验 / 开通信号 / 终端认证 / 流程导航 / 草稿
// 技术栈: Rust + SQLite（草稿） + 远端网关 trait
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 草稿存储
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 作业规则
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 工单会话
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CertificationState, CertifyType, ItemCategory, ProcessStep, SignalStatus, TransportMode,
    WorkStatus, WorkType,
};

// 领域实体
pub use domain::{AllocationRecord, DraftSnapshot, InventorySnapshot, WorkContext};

// 引擎
pub use engine::{
    AllocationStore, CertificationOrchestrator, ProcessStateMachine, SignalPriorityResolver,
    ValidationEngine,
};

// API
pub use api::{ApiError, ApiResult, WorkServices, WorkSessionApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "现场工单系统";

// 草稿表结构版本
pub const DB_VERSION: &str = "v0.1";
