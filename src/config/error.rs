// ==========================================
// 现场工单系统 - 配置层错误类型
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置数据库错误: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置锁获取失败: {0}")]
    LockError(String),

    #[error("配置值无效 (key={key}): {message}")]
    InvalidValue { key: String, message: String },
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
