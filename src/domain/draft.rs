// ==========================================
// 现场工单系统 - 工单草稿快照
// ==========================================
// 职责: 离开/返回同一工单时恢复分配、步骤与认证状态
// 红线: 恢复前必须比对库存指纹，不假设快照新鲜
// ==========================================

use crate::domain::certification::CertificationSession;
use crate::domain::equipment::{AllocationRecord, RemovalRecord};
use crate::domain::process::ProcessState;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 分配存储的可序列化快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSnapshot {
    pub allocations: Vec<AllocationRecord>,
    pub removals: Vec<RemovalRecord>,
    /// 分配设备指纹
    pub fingerprint: String,
}

/// 草稿快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub work_id: String,
    /// 保存时的库存指纹
    pub inventory_fingerprint: String,
    pub allocation: AllocationSnapshot,
    pub process: Option<ProcessState>,
    #[serde(default)]
    pub certification: CertificationSession,
    pub saved_at: NaiveDateTime,
}

impl DraftSnapshot {
    /// 快照是否仍与当前库存一致
    pub fn matches_inventory(&self, live_fingerprint: &str) -> bool {
        self.inventory_fingerprint == live_fingerprint
    }
}
