// ==========================================
// 现场工单系统 - API 层
// ==========================================
// 职责: 提供按步骤划分的工单会话接口，供宿主界面调用
// ==========================================

pub mod error;
pub mod work_session_api;

// 重导出核心类型
pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use work_session_api::{
    CertifyCommand, CertifyOutcome, DraftRestore, EquipmentCommand, EquipmentOutcome,
    NavCommand, SaveReport, SignalOutcome, WorkServices, WorkSessionApi,
};
