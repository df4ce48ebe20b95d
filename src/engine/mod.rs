// ==========================================
// 现场工单系统 - 引擎层
// ==========================================
// 职责: 设备分配、保存校验、开通信号、终端认证、流程导航
// 红线: Engine 不拼 SQL, 远端调用只经过 gateways 中的 trait
// ==========================================

pub mod allocation;
pub mod certification;
pub mod events;
pub mod gateways;
pub mod process;
pub mod signal_priority;
pub mod validation;

// 重导出核心引擎
pub use allocation::{AllocationError, AllocationResult, AllocationStore, RecoverOutcome};
pub use certification::{
    CertificationOrchestrator, CertifyError, CertifyResult, LineQuery, SubscribeOutcome,
    TerminationOutcome,
};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, WorkEvent, WorkEventKind, WorkEventPublisher,
};
pub use gateways::{CertifyGateway, GatewayError, GatewayResult, InventoryService, SignalGateway};
pub use process::{GuardResult, GuardViolation, ProcessStateMachine};
pub use signal_priority::{SignalPlan, SignalPriorityResolver, SignalResolveError, SignalResult};
pub use validation::{
    validate_cancel, validate_contract_status, ValidationEngine, ValidationFailure,
    ValidationResult,
};
