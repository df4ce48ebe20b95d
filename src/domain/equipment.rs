// ==========================================
// 现场工单系统 - 设备领域模型
// ==========================================
// 职责: 合同设备槽位、技师库存设备、分配记录、回收记录
// 红线: 仅数据结构，不含分配规则（见 engine::allocation）
// ==========================================

use crate::domain::types::{ChangeTag, ItemCategory};
use serde::{Deserialize, Serialize};

// ==========================================
// ContractEquipmentSlot - 合同设备槽位
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEquipmentSlot {
    pub slot_id: String,
    pub category: ItemCategory,
    pub model_code: String,
    pub display_name: String,
    /// 设备分类代码 (EQT_CL_CD)，配对规则使用
    #[serde(default)]
    pub class_code: String,
}

// ==========================================
// OwnershipFields - 客户自有设备登记字段
// ==========================================
// LENT_YN = "40" 即客户自有
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipFields {
    pub customer_owned: bool,
    pub item_code: Option<String>,     // ITEM_CD
    pub unit_dir_id: Option<String>,   // EQT_UNI_ID
    pub cm_mac: Option<String>,        // STB_CM_MAC
    pub rtca_id: Option<String>,       // STB_RTCA_ID
    pub ownership_type: Option<String>, // OWNER_TP_CD
}

// ==========================================
// StockUnit - 技师库存设备（实物）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUnit {
    pub unit_id: String,
    pub serial_no: String,
    pub mac_address: Option<String>,
    pub category: ItemCategory,
    pub model_code: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub class_code: String,
    #[serde(default)]
    pub ownership: OwnershipFields,
}

impl StockUnit {
    /// 与槽位的品类、型号是否一致
    pub fn matches_slot(&self, slot: &ContractEquipmentSlot) -> bool {
        self.category == slot.category && self.model_code == slot.model_code
    }

    pub fn is_customer_owned(&self) -> bool {
        self.ownership.customer_owned
    }
}

// ==========================================
// AllocationRecord - 槽位与实物的绑定
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub slot: ContractEquipmentSlot,
    pub unit: StockUnit,
    pub install_location: Option<String>,
    pub mac_override: Option<String>,
    pub change_tag: ChangeTag,
}

impl AllocationRecord {
    pub fn new(slot: ContractEquipmentSlot, unit: StockUnit, change_tag: ChangeTag) -> Self {
        Self {
            slot,
            unit,
            install_location: None,
            mac_override: None,
            change_tag,
        }
    }

    /// 生效 MAC（人工覆写优先）
    pub fn effective_mac(&self) -> Option<&str> {
        self.mac_override
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.unit.mac_address.as_deref().filter(|m| !m.trim().is_empty()))
    }

    /// 以分配的实物品类为准（预装设备可能与槽位品类不同）
    pub fn category(&self) -> ItemCategory {
        self.unit.category
    }
}

// ==========================================
// LossFlags - 回收设备丢失/损坏标记
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossFlags {
    pub unit_lost: bool,    // EQT_LOSS_YN
    pub adapter_lost: bool, // PART_LOSS_BRK_YN
    pub remote_broken: bool, // EQT_BRK_YN
    pub cable_lost: bool,   // EQT_CABL_LOSS_YN
    pub cradle_lost: bool,  // EQT_CRDL_LOSS_YN
}

impl LossFlags {
    pub fn any(&self) -> bool {
        self.unit_lost || self.adapter_lost || self.remote_broken || self.cable_lost || self.cradle_lost
    }

    /// 转换为后端 Y/N 字段
    pub fn as_codes(&self) -> [(&'static str, &'static str); 5] {
        let yn = |b: bool| if b { "Y" } else { "N" };
        [
            ("EQT_LOSS_YN", yn(self.unit_lost)),
            ("PART_LOSS_BRK_YN", yn(self.adapter_lost)),
            ("EQT_BRK_YN", yn(self.remote_broken)),
            ("EQT_CABL_LOSS_YN", yn(self.cable_lost)),
            ("EQT_CRDL_LOSS_YN", yn(self.cradle_lost)),
        ]
    }
}

/// 回收记录来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovalOrigin {
    /// 本次分配后撤回
    Recovered,
    /// 后端上报的已装设备
    Installed,
    /// 后端回收清单中的设备，不可撤销
    Reported,
}

// ==========================================
// RemovalRecord - 待回收设备
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRecord {
    pub unit: StockUnit,
    pub flags: LossFlags,
    pub origin: RemovalOrigin,
}

impl RemovalRecord {
    pub fn new(unit: StockUnit, origin: RemovalOrigin) -> Self {
        Self {
            unit,
            flags: LossFlags::default(),
            origin,
        }
    }
}

// ==========================================
// InventorySnapshot - 库存服务返回
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    /// 合同设备 (output2)
    pub contract_slots: Vec<ContractEquipmentSlot>,
    /// 技师库存 (output3)
    pub stock_units: Vec<StockUnit>,
    /// 客户已装设备 (output4)
    pub installed_units: Vec<StockUnit>,
    /// 已回收设备
    pub removed_units: Vec<StockUnit>,
}

impl InventorySnapshot {
    /// 库存指纹: 全部实物 id 排序后以逗号拼接
    ///
    /// 草稿恢复时与当前库存比对，不一致则草稿作废
    pub fn fingerprint(&self) -> String {
        let mut ids: Vec<&str> = self
            .stock_units
            .iter()
            .chain(self.installed_units.iter())
            .chain(self.removed_units.iter())
            .map(|u| u.unit_id.as_str())
            .collect();
        ids.sort_unstable();
        ids.join(",")
    }
}
