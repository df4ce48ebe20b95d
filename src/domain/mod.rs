// ==========================================
// 现场工单系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、外部协议报文
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod certification;
pub mod draft;
pub mod equipment;
pub mod process;
pub mod protocol;
pub mod types;
pub mod work;

// 重导出核心类型
pub use certification::{
    BindingKind, CertificationSession, DeviceInfo, DirectoryBinding, DirectoryLink,
    LineDescriptor, NetworkNode, PortInfo, Subscription,
};
pub use draft::{AllocationSnapshot, DraftSnapshot};
pub use equipment::{
    AllocationRecord, ContractEquipmentSlot, InventorySnapshot, LossFlags, OwnershipFields,
    RemovalOrigin, RemovalRecord, StockUnit,
};
pub use process::ProcessState;
pub use types::{
    ActivationReason, AllocationLoadState, CertificationState, CertifyType, ChangeTag,
    ContractStatus, ItemCategory, ProcessStep, SignalStatus, TransportMode, WorkStatus, WorkType,
};
pub use work::{AddOnProduct, WorkContext};
