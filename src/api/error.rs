// ==========================================
// 现场工单系统 - API层错误类型
// ==========================================
// 职责: 汇总各层错误，转换为面向技师的错误分类
// 分类: 校验失败 / 远端调用失败 / 步骤守卫 / 数据过期
// ==========================================

use crate::config::error::ConfigError;
use crate::engine::allocation::AllocationError;
use crate::engine::certification::CertifyError;
use crate::engine::gateways::GatewayError;
use crate::engine::process::GuardViolation;
use crate::engine::signal_priority::SignalResolveError;
use crate::engine::validation::ValidationFailure;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 技师可处理的错误
    // ==========================================
    #[error("校验失败: {0}")]
    ValidationError(String),

    #[error("远端调用失败 [{endpoint}]: {message}")]
    RemoteCallError { endpoint: String, message: String },

    #[error("步骤守卫: {0}")]
    GuardViolation(String),

    #[error("数据已过期: {0}")]
    StaleData(String),

    #[error("需要确认: {0}")]
    ConfirmationRequired(String),

    // ==========================================
    // 状态错误
    // ==========================================
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("工单只读: {0}")]
    ReadOnly(String),

    #[error("工单尚未打开")]
    NotOpened,

    // ==========================================
    // 基础设施错误
    // ==========================================
    #[error("草稿存储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 错误分类代码（给宿主界面选择提示方式）
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::ValidationError(_) | ApiError::ConfirmationRequired(_) => {
                ApiErrorKind::Validation
            }
            ApiError::RemoteCallError { .. } => ApiErrorKind::RemoteCall,
            ApiError::GuardViolation(_) | ApiError::ReadOnly(_) => ApiErrorKind::Guard,
            ApiError::StaleData(_) => ApiErrorKind::StaleData,
            ApiError::InvalidStateTransition { .. } | ApiError::NotFound(_) | ApiError::NotOpened => {
                ApiErrorKind::State
            }
            ApiError::Repository(_) | ApiError::Config(_) | ApiError::Other(_) => {
                ApiErrorKind::Internal
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorKind {
    Validation,
    RemoteCall,
    Guard,
    StaleData,
    State,
    Internal,
}

// ==========================================
// 从引擎层错误转换
// ==========================================

impl From<ValidationFailure> for ApiError {
    fn from(err: ValidationFailure) -> Self {
        ApiError::ValidationError(err.localized_message())
    }
}

impl From<GuardViolation> for ApiError {
    fn from(err: GuardViolation) -> Self {
        match err {
            GuardViolation::ReadOnly => ApiError::ReadOnly(err.localized_message()),
            GuardViolation::InvalidStatusTransition { from, to } => {
                ApiError::InvalidStateTransition {
                    from: from.to_string(),
                    to: to.to_string(),
                }
            }
            other => ApiError::GuardViolation(other.localized_message()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::RemoteCallError { endpoint, message }
            | GatewayError::MalformedResponse { endpoint, message } => {
                ApiError::RemoteCallError { endpoint, message }
            }
        }
    }
}

impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::ReadOnly => ApiError::ReadOnly(err.to_string()),
            AllocationError::UnknownSlot(id) => ApiError::NotFound(format!("合同设备槽位 {}", id)),
            AllocationError::UnknownUnit(id) => ApiError::NotFound(format!("设备 {}", id)),
            AllocationError::SnapshotMismatch { .. } => ApiError::StaleData(err.to_string()),
            other => ApiError::ValidationError(other.to_string()),
        }
    }
}

impl From<SignalResolveError> for ApiError {
    fn from(err: SignalResolveError) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<CertifyError> for ApiError {
    fn from(err: CertifyError) -> Self {
        match err {
            CertifyError::Remote(e) => e.into(),
            CertifyError::Rejected {
                operation,
                code,
                message,
            } => ApiError::RemoteCallError {
                endpoint: operation.to_string(),
                message: if code.is_empty() {
                    message
                } else {
                    format!("[{}] {}", code, message)
                },
            },
            CertifyError::StaleDescriptor => ApiError::StaleData(err.to_string()),
            CertifyError::InvalidState { state, operation } => ApiError::InvalidStateTransition {
                from: state.to_string(),
                to: operation.to_string(),
            },
            other => ApiError::ValidationError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CertificationState;

    #[test]
    fn test_certify_errors_map_to_taxonomy() {
        let stale: ApiError = CertifyError::StaleDescriptor.into();
        assert_eq!(stale.kind(), ApiErrorKind::StaleData);

        let rejected: ApiError = CertifyError::Rejected {
            operation: "activate_service",
            code: "E1".to_string(),
            message: "denied".to_string(),
        }
        .into();
        assert_eq!(rejected.kind(), ApiErrorKind::RemoteCall);
        assert!(rejected.to_string().contains("[E1] denied"));

        let invalid: ApiError = CertifyError::InvalidState {
            state: CertificationState::Unsubscribed,
            operation: "register_line",
        }
        .into();
        assert_eq!(invalid.kind(), ApiErrorKind::State);
    }

    #[test]
    fn test_guard_and_allocation_mapping() {
        let read_only: ApiError = GuardViolation::ReadOnly.into();
        assert_eq!(read_only.kind(), ApiErrorKind::Guard);

        let guard: ApiError = GuardViolation::DirectoryNotLinked.into();
        assert!(matches!(guard, ApiError::GuardViolation(_)));

        let missing: ApiError = AllocationError::UnknownSlot("S9".to_string()).into();
        assert!(matches!(missing, ApiError::NotFound(_)));

        let remote: ApiError = GatewayError::remote("load_inventory", "timeout").into();
        assert_eq!(remote.kind(), ApiErrorKind::RemoteCall);
    }
}
