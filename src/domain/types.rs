// ==========================================
// 现场工单系统 - 领域类型定义
// ==========================================
// 职责: 品类代码、作业类型、状态标签等枚举
// 序列化格式: 与后端代码保持一致（"01"、"U"、"1" 等）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 设备品类 (ITEM_MID_CD)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    #[serde(rename = "01")]
    Router, // 路由器
    #[serde(rename = "02")]
    WirelessRouter, // 无线路由器
    #[serde(rename = "03")]
    Modem, // 调制解调器
    #[serde(rename = "04")]
    SetTop, // 机顶盒
    #[serde(rename = "05")]
    FiberTerminal, // 光终端 (ONT)
    #[serde(rename = "06")]
    Cable, // 线缆
    #[serde(rename = "07")]
    Special, // 特殊设备
    #[serde(rename = "08")]
    VoipGateway, // VoIP 网关
    #[serde(rename = "10")]
    VoipExtension, // VoIP 分机 / AP
    #[serde(rename = "21")]
    IspTerminal, // ISP 终端
    #[serde(other)]
    Other,
}

impl ItemCategory {
    pub fn as_code(&self) -> &'static str {
        match self {
            ItemCategory::Router => "01",
            ItemCategory::WirelessRouter => "02",
            ItemCategory::Modem => "03",
            ItemCategory::SetTop => "04",
            ItemCategory::FiberTerminal => "05",
            ItemCategory::Cable => "06",
            ItemCategory::Special => "07",
            ItemCategory::VoipGateway => "08",
            ItemCategory::VoipExtension => "10",
            ItemCategory::IspTerminal => "21",
            ItemCategory::Other => "",
        }
    }

    pub fn from_code(code: &str) -> ItemCategory {
        match code.trim() {
            "01" => ItemCategory::Router,
            "02" => ItemCategory::WirelessRouter,
            "03" => ItemCategory::Modem,
            "04" => ItemCategory::SetTop,
            "05" => ItemCategory::FiberTerminal,
            "06" => ItemCategory::Cable,
            "07" => ItemCategory::Special,
            "08" => ItemCategory::VoipGateway,
            "10" => ItemCategory::VoipExtension,
            "21" => ItemCategory::IspTerminal,
            _ => ItemCategory::Other,
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemCategory::Other => write!(f, "OTHER"),
            other => write!(f, "{}", other.as_code()),
        }
    }
}

// ==========================================
// 分配标签 (Change Tag)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeTag {
    New,   // 新装
    Reuse, // 回收再利用
}

impl fmt::Display for ChangeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeTag::New => write!(f, "new"),
            ChangeTag::Reuse => write!(f, "reuse"),
        }
    }
}

// ==========================================
// 接入方式 (Transport Mode)
// ==========================================
// 由光种代码 (OPLN_KD_CD) 推导
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    Fiber,    // FTTH
    WideBand, // 光宽带（固定端口）
    None,
}

impl TransportMode {
    /// 从光种代码推导接入方式
    ///
    /// F/FG/Z/ZG → 光纤; N/NG/V/VG → 固定端口; 其余 → 无
    pub fn from_op_code(code: &str) -> TransportMode {
        match code.trim().to_uppercase().as_str() {
            "F" | "FG" | "Z" | "ZG" => TransportMode::Fiber,
            "N" | "NG" | "V" | "VG" => TransportMode::WideBand,
            _ => TransportMode::None,
        }
    }

    /// 设备列表查询命令
    pub fn equipment_list_command(&self) -> Option<&'static str> {
        match self {
            TransportMode::Fiber => Some("ftthEqipList"),
            TransportMode::WideBand => Some("opticEqipList"),
            TransportMode::None => None,
        }
    }

    /// 端口列表查询命令
    pub fn port_list_command(&self) -> Option<&'static str> {
        match self {
            TransportMode::Fiber => Some("ftthEqipPortList"),
            TransportMode::WideBand => Some("opticEqipPortList"),
            TransportMode::None => None,
        }
    }

    /// 线路登记时的设备分类 (EQIP_DIVS)
    pub fn equipment_division(&self) -> &'static str {
        match self {
            TransportMode::Fiber => "OLT",
            _ => "L2",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Fiber => write!(f, "FIBER"),
            TransportMode::WideBand => write!(f, "WIDE_BAND"),
            TransportMode::None => write!(f, "NONE"),
        }
    }
}

// ==========================================
// 作业类型 (WRK_CD)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkType {
    #[serde(rename = "01")]
    Install, // 开通
    #[serde(rename = "02")]
    Termination, // 解约
    #[serde(rename = "03")]
    AfterService, // A/S
    #[serde(rename = "04")]
    Relocation, // 迁移
    #[serde(rename = "05")]
    ProductChange, // 产品变更
    #[serde(rename = "06")]
    Suspension, // 停机
    #[serde(rename = "07")]
    RemovalMove, // 拆除（迁移）
    #[serde(rename = "08")]
    RemovalTerm, // 拆除（解约）
    #[serde(rename = "0410")]
    TempSuspension, // 暂停
    #[serde(rename = "0420")]
    SuspensionRelease, // 暂停解除
    #[serde(other)]
    Other,
}

impl WorkType {
    pub fn as_code(&self) -> &'static str {
        match self {
            WorkType::Install => "01",
            WorkType::Termination => "02",
            WorkType::AfterService => "03",
            WorkType::Relocation => "04",
            WorkType::ProductChange => "05",
            WorkType::Suspension => "06",
            WorkType::RemovalMove => "07",
            WorkType::RemovalTerm => "08",
            WorkType::TempSuspension => "0410",
            WorkType::SuspensionRelease => "0420",
            WorkType::Other => "09",
        }
    }

    /// 迁移/变更类作业需要判定认证类型
    pub fn requires_certify_type(&self) -> bool {
        matches!(self, WorkType::Relocation | WorkType::ProductChange)
    }

    /// 线路登记业务类型 (BIZ_TYPE): 01=安装, 02=A/S
    pub fn line_biz_type(&self) -> &'static str {
        match self {
            WorkType::AfterService => "02",
            _ => "01",
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

// ==========================================
// 作业状态 (WRK_STAT_CD)
// ==========================================
// 状态流转: 1→{2,3}, 2→{3,4,7}, 7→{4}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkStatus {
    #[serde(rename = "1")]
    Received, // 受理
    #[serde(rename = "2")]
    Assigned, // 派工
    #[serde(rename = "3")]
    Cancelled, // 取消
    #[serde(rename = "4")]
    Completed, // 完成
    #[serde(rename = "7")]
    PartialCompleted, // 部分完成
    #[serde(rename = "9")]
    Deleted, // 删除
}

impl WorkStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            WorkStatus::Received => "1",
            WorkStatus::Assigned => "2",
            WorkStatus::Cancelled => "3",
            WorkStatus::Completed => "4",
            WorkStatus::PartialCompleted => "7",
            WorkStatus::Deleted => "9",
        }
    }

    pub fn parse(code: &str) -> Option<WorkStatus> {
        match code.trim() {
            "1" => Some(WorkStatus::Received),
            "2" => Some(WorkStatus::Assigned),
            "3" => Some(WorkStatus::Cancelled),
            "4" => Some(WorkStatus::Completed),
            "7" => Some(WorkStatus::PartialCompleted),
            "9" => Some(WorkStatus::Deleted),
            _ => None,
        }
    }

    /// 状态流转是否合法（同状态不算流转）
    pub fn can_transition_to(&self, next: WorkStatus) -> bool {
        matches!(
            (self, next),
            (WorkStatus::Received, WorkStatus::Assigned)
                | (WorkStatus::Received, WorkStatus::Cancelled)
                | (WorkStatus::Assigned, WorkStatus::Cancelled)
                | (WorkStatus::Assigned, WorkStatus::Completed)
                | (WorkStatus::Assigned, WorkStatus::PartialCompleted)
                | (WorkStatus::PartialCompleted, WorkStatus::Completed)
        )
    }

    /// 仅受理/派工状态可编辑、可取消
    pub fn is_editable(&self) -> bool {
        matches!(self, WorkStatus::Received | WorkStatus::Assigned)
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

// ==========================================
// 合同状态 (CTRT_STAT)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    #[serde(rename = "10")]
    InstallScheduled, // 待安装
    #[serde(rename = "20")]
    Active, // 正常
    #[serde(rename = "30")]
    Suspended, // 暂停
    #[serde(rename = "37")]
    SuspendedSpecific, // 暂停（特定）
    #[serde(rename = "90")]
    Terminated, // 已解约
    #[serde(other)]
    Other,
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractStatus::InstallScheduled => write!(f, "10"),
            ContractStatus::Active => write!(f, "20"),
            ContractStatus::Suspended => write!(f, "30"),
            ContractStatus::SuspendedSpecific => write!(f, "37"),
            ContractStatus::Terminated => write!(f, "90"),
            ContractStatus::Other => write!(f, "OTHER"),
        }
    }
}

// ==========================================
// 认证类型 (CERTIFY_TYPE)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertifyType {
    #[serde(rename = "U")]
    Update,
    #[serde(rename = "C")]
    Create,
    #[serde(rename = "D")]
    Delete,
}

impl CertifyType {
    pub fn as_code(&self) -> &'static str {
        match self {
            CertifyType::Update => "U",
            CertifyType::Create => "C",
            CertifyType::Delete => "D",
        }
    }
}

impl fmt::Display for CertifyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

// ==========================================
// 认证状态 (Certification State)
// ==========================================
// Unsubscribed → Subscribed → DirectoryLinked → LineRegistered → Activated | Terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificationState {
    Unsubscribed,
    Subscribed,
    DirectoryLinked,
    LineRegistered,
    Activated,
    Terminated,
}

impl fmt::Display for CertificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificationState::Unsubscribed => write!(f, "UNSUBSCRIBED"),
            CertificationState::Subscribed => write!(f, "SUBSCRIBED"),
            CertificationState::DirectoryLinked => write!(f, "DIRECTORY_LINKED"),
            CertificationState::LineRegistered => write!(f, "LINE_REGISTERED"),
            CertificationState::Activated => write!(f, "ACTIVATED"),
            CertificationState::Terminated => write!(f, "TERMINATED"),
        }
    }
}

// ==========================================
// 流程步骤 (Process Step)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStep {
    ContractReview,      // 合同确认
    ReceptionReview,     // 受理确认
    EquipmentAssignment, // 设备分配
    LineRegistration,    // 线路登记（仅认证产品）
    Completion,          // 作业完成
    PostProcess,         // 后处理
}

impl fmt::Display for ProcessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStep::ContractReview => write!(f, "CONTRACT_REVIEW"),
            ProcessStep::ReceptionReview => write!(f, "RECEPTION_REVIEW"),
            ProcessStep::EquipmentAssignment => write!(f, "EQUIPMENT_ASSIGNMENT"),
            ProcessStep::LineRegistration => write!(f, "LINE_REGISTRATION"),
            ProcessStep::Completion => write!(f, "COMPLETION"),
            ProcessStep::PostProcess => write!(f, "POST_PROCESS"),
        }
    }
}

// ==========================================
// 分配数据加载状态
// ==========================================
// 替代 isReady / isDataLoaded 等散落布尔标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationLoadState {
    NotLoaded,
    Loading,
    Loaded,
}

impl fmt::Display for AllocationLoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationLoadState::NotLoaded => write!(f, "NOT_LOADED"),
            AllocationLoadState::Loading => write!(f, "LOADING"),
            AllocationLoadState::Loaded => write!(f, "LOADED"),
        }
    }
}

// ==========================================
// 开通信号状态（缓存）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Unknown,
    Succeeded,
    Failed,
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalStatus::Unknown => write!(f, "UNKNOWN"),
            SignalStatus::Succeeded => write!(f, "SUCCEEDED"),
            SignalStatus::Failed => write!(f, "FAILED"),
        }
    }
}

// ==========================================
// 开通原因 (REASON)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationReason {
    New,
    AfterService,
    Change,
}

impl ActivationReason {
    /// 后端约定的原因代码
    pub fn as_code(&self) -> &'static str {
        match self {
            ActivationReason::New => "신규",
            ActivationReason::AfterService => "AS",
            ActivationReason::Change => "변경",
        }
    }

    /// 按作业类型推导开通原因
    pub fn for_work_type(work_type: WorkType) -> ActivationReason {
        match work_type {
            WorkType::AfterService => ActivationReason::AfterService,
            WorkType::Relocation | WorkType::ProductChange => ActivationReason::Change,
            _ => ActivationReason::New,
        }
    }
}

impl fmt::Display for ActivationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}
