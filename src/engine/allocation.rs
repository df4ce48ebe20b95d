// ==========================================
// 现场工单系统 - 设备分配存储
// ==========================================
// 职责: 按工单维护合同槽位、技师库存、分配记录与回收记录
// 红线:
// - 每个槽位至多一条分配记录
// - 同一实物至多出现在一条分配记录中
// - 已标记回收的实物不得同时处于分配状态
// - 后端回收清单中的实物被替换或取消分配时回到回收列表
// - 任何变更都会清空缓存的开通信号状态
// ==========================================

use crate::domain::draft::AllocationSnapshot;
use crate::domain::equipment::{
    AllocationRecord, ContractEquipmentSlot, InventorySnapshot, LossFlags, RemovalOrigin,
    RemovalRecord, StockUnit,
};
use crate::domain::types::{AllocationLoadState, ChangeTag, ItemCategory, SignalStatus};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("合同设备槽位不存在: {0}")]
    UnknownSlot(String),

    #[error("设备不存在: {0}")]
    UnknownUnit(String),

    #[error("设备已分配到其他槽位: unit={unit_id}, slot={slot_id}")]
    UnitAlreadyAllocated { unit_id: String, slot_id: String },

    #[error("设备已标记回收: {0}")]
    UnitMarkedForRemoval(String),

    #[error("设备未标记回收: {0}")]
    UnitNotMarkedForRemoval(String),

    #[error("后端回收清单中的设备不可撤销回收: {0}")]
    ReportedRemoval(String),

    #[error("设备与槽位品类/型号不一致: unit={unit_id}, slot={slot_id}")]
    SlotMismatch { unit_id: String, slot_id: String },

    #[error("草稿快照与分配记录不一致: expected={expected}, actual={actual}")]
    SnapshotMismatch { expected: String, actual: String },

    #[error("工单只读, 不允许修改设备分配")]
    ReadOnly,
}

pub type AllocationResult<T> = Result<T, AllocationError>;

/// 回收操作结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverOutcome {
    /// 新建了回收记录
    Recovered,
    /// 已在回收列表中，未做任何修改
    AlreadyMarked,
}

// ==========================================
// AllocationStore - 设备分配存储
// ==========================================
#[derive(Debug, Clone)]
pub struct AllocationStore {
    work_id: String,
    slots: Vec<ContractEquipmentSlot>,
    stock: Vec<StockUnit>,
    installed: Vec<StockUnit>,
    allocations: Vec<AllocationRecord>,
    removals: Vec<RemovalRecord>,
    load_state: AllocationLoadState,
    inventory_fingerprint: String,
    signal_status: SignalStatus,
    signal_result: Option<String>,
    read_only: bool,
}

impl AllocationStore {
    pub fn new(work_id: &str) -> Self {
        Self {
            work_id: work_id.to_string(),
            slots: Vec::new(),
            stock: Vec::new(),
            installed: Vec::new(),
            allocations: Vec::new(),
            removals: Vec::new(),
            load_state: AllocationLoadState::NotLoaded,
            inventory_fingerprint: String::new(),
            signal_status: SignalStatus::Unknown,
            signal_result: None,
            read_only: false,
        }
    }

    // ==========================================
    // 加载
    // ==========================================

    /// 标记开始加载（加载完成前草稿写入被抑制）
    pub fn begin_load(&mut self) {
        self.load_state = AllocationLoadState::Loading;
    }

    /// 用库存服务返回的数据初始化
    ///
    /// 已装设备按品类绑定到第一个空闲槽位；无法绑定的留在已装列表，可被回收
    pub fn load(&mut self, inventory: InventorySnapshot) {
        self.inventory_fingerprint = inventory.fingerprint();
        let InventorySnapshot {
            contract_slots,
            stock_units,
            installed_units,
            removed_units,
        } = inventory;

        self.slots = contract_slots;
        self.stock = stock_units;
        self.removals = removed_units
            .into_iter()
            .map(|u| RemovalRecord::new(u, RemovalOrigin::Reported))
            .collect();
        self.allocations.clear();
        self.installed.clear();

        for unit in installed_units {
            if self.is_marked_for_removal(&unit.unit_id) {
                continue;
            }
            let free_slot = self
                .slots
                .iter()
                .find(|s| s.category == unit.category && self.allocation_for_slot(&s.slot_id).is_none())
                .cloned();
            if let Some(slot) = free_slot {
                self.allocations
                    .push(AllocationRecord::new(slot, unit.clone(), ChangeTag::New));
            }
            self.installed.push(unit);
        }

        self.load_state = AllocationLoadState::Loaded;
        self.reset_signal();

        debug!(
            work_id = %self.work_id,
            slots = self.slots.len(),
            stock = self.stock.len(),
            allocations = self.allocations.len(),
            removals = self.removals.len(),
            "设备分配数据加载完成"
        );
    }

    // ==========================================
    // 变更操作
    // ==========================================

    /// 将库存设备分配到槽位（同槽位已有记录则替换，标记为 new）
    pub fn assign(&mut self, slot_id: &str, unit_id: &str) -> AllocationResult<&AllocationRecord> {
        self.ensure_writable()?;
        let slot = self.find_slot(slot_id)?.clone();

        if self.is_marked_for_removal(unit_id) {
            return Err(AllocationError::UnitMarkedForRemoval(unit_id.to_string()));
        }
        if let Some(other) = self
            .allocations
            .iter()
            .find(|a| a.unit.unit_id == unit_id && a.slot.slot_id != slot_id)
        {
            return Err(AllocationError::UnitAlreadyAllocated {
                unit_id: unit_id.to_string(),
                slot_id: other.slot.slot_id.clone(),
            });
        }

        let unit = self
            .stock
            .iter()
            .chain(self.installed.iter())
            .find(|u| u.unit_id == unit_id)
            .cloned()
            .ok_or_else(|| AllocationError::UnknownUnit(unit_id.to_string()))?;

        if !unit.matches_slot(&slot) {
            return Err(AllocationError::SlotMismatch {
                unit_id: unit_id.to_string(),
                slot_id: slot_id.to_string(),
            });
        }

        let record = AllocationRecord::new(slot, unit, ChangeTag::New);
        let index = self.put_allocation(record);
        self.on_mutation("assign");
        Ok(&self.allocations[index])
    }

    /// 取消槽位分配
    pub fn unassign(&mut self, slot_id: &str) -> AllocationResult<Option<AllocationRecord>> {
        self.ensure_writable()?;
        self.find_slot(slot_id)?;
        let removed = self
            .allocations
            .iter()
            .position(|a| a.slot.slot_id == slot_id)
            .map(|i| self.allocations.remove(i));
        if let Some(record) = &removed {
            self.return_displaced(record.clone());
            self.on_mutation("unassign");
        }
        Ok(removed)
    }

    /// 回收设备: 撤销其分配并建立回收记录
    ///
    /// 已在回收列表中的设备不做任何处理
    pub fn recover(&mut self, unit_id: &str) -> AllocationResult<RecoverOutcome> {
        self.ensure_writable()?;
        if self.is_marked_for_removal(unit_id) {
            return Ok(RecoverOutcome::AlreadyMarked);
        }

        let record = if let Some(i) = self.allocations.iter().position(|a| a.unit.unit_id == unit_id) {
            let allocation = self.allocations.remove(i);
            let origin = if self.is_inventory_unit(unit_id) {
                RemovalOrigin::Recovered
            } else {
                RemovalOrigin::Reported
            };
            RemovalRecord::new(allocation.unit, origin)
        } else if let Some(unit) = self.installed.iter().find(|u| u.unit_id == unit_id) {
            RemovalRecord::new(unit.clone(), RemovalOrigin::Installed)
        } else {
            return Err(AllocationError::UnknownUnit(unit_id.to_string()));
        };

        self.removals.push(record);
        self.on_mutation("recover");
        Ok(RecoverOutcome::Recovered)
    }

    /// 回收设备再利用: 清除回收记录及其丢失标记，按 reuse 分配到槽位
    pub fn reuse(&mut self, unit_id: &str, slot_id: &str) -> AllocationResult<&AllocationRecord> {
        self.ensure_writable()?;
        let slot = self.find_slot(slot_id)?.clone();
        let index = self
            .removals
            .iter()
            .position(|r| r.unit.unit_id == unit_id)
            .ok_or_else(|| AllocationError::UnknownUnit(unit_id.to_string()))?;

        if !self.removals[index].unit.matches_slot(&slot) {
            return Err(AllocationError::SlotMismatch {
                unit_id: unit_id.to_string(),
                slot_id: slot_id.to_string(),
            });
        }

        let removal = self.removals.remove(index);
        let record = AllocationRecord::new(slot, removal.unit, ChangeTag::Reuse);
        let index = self.put_allocation(record);
        self.on_mutation("reuse");
        Ok(&self.allocations[index])
    }

    /// 撤销回收: 删除回收记录及其丢失标记，设备回到库存或已装列表
    ///
    /// 后端回收清单中的设备不可撤销
    pub fn cancel_recovery(&mut self, unit_id: &str) -> AllocationResult<RemovalRecord> {
        self.ensure_writable()?;
        let index = self
            .removals
            .iter()
            .position(|r| r.unit.unit_id == unit_id)
            .ok_or_else(|| AllocationError::UnitNotMarkedForRemoval(unit_id.to_string()))?;
        if self.removals[index].origin == RemovalOrigin::Reported {
            return Err(AllocationError::ReportedRemoval(unit_id.to_string()));
        }

        let removal = self.removals.remove(index);
        self.on_mutation("cancel_recovery");
        Ok(removal)
    }

    /// 设置回收设备的丢失/损坏标记
    pub fn set_loss_flags(&mut self, unit_id: &str, flags: LossFlags) -> AllocationResult<()> {
        self.ensure_writable()?;
        let removal = self
            .removals
            .iter_mut()
            .find(|r| r.unit.unit_id == unit_id)
            .ok_or_else(|| AllocationError::UnknownUnit(unit_id.to_string()))?;
        removal.flags = flags;
        self.on_mutation("set_loss_flags");
        Ok(())
    }

    pub fn set_install_location(&mut self, slot_id: &str, location: Option<String>) -> AllocationResult<()> {
        self.ensure_writable()?;
        let record = self.allocation_mut(slot_id)?;
        record.install_location = location;
        self.on_mutation("set_install_location");
        Ok(())
    }

    pub fn set_mac_override(&mut self, slot_id: &str, mac: Option<String>) -> AllocationResult<()> {
        self.ensure_writable()?;
        let record = self.allocation_mut(slot_id)?;
        record.mac_override = mac;
        self.on_mutation("set_mac_override");
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 槽位可选库存: 未分配、未回收、品类与型号一致
    pub fn available_stock(&self, slot_id: &str) -> Vec<&StockUnit> {
        let slot = match self.slots.iter().find(|s| s.slot_id == slot_id) {
            Some(slot) => slot,
            None => return Vec::new(),
        };
        self.stock
            .iter()
            .filter(|u| u.matches_slot(slot))
            .filter(|u| !self.is_allocated(&u.unit_id))
            .filter(|u| !self.is_marked_for_removal(&u.unit_id))
            .collect()
    }

    /// 槽位可再利用的回收设备
    pub fn reusable_removals(&self, slot_id: &str) -> Vec<&RemovalRecord> {
        let slot = match self.slots.iter().find(|s| s.slot_id == slot_id) {
            Some(slot) => slot,
            None => return Vec::new(),
        };
        self.removals
            .iter()
            .filter(|r| r.unit.matches_slot(slot))
            .collect()
    }

    pub fn work_id(&self) -> &str {
        &self.work_id
    }

    pub fn slots(&self) -> &[ContractEquipmentSlot] {
        &self.slots
    }

    pub fn stock(&self) -> &[StockUnit] {
        &self.stock
    }

    pub fn installed(&self) -> &[StockUnit] {
        &self.installed
    }

    pub fn allocations(&self) -> &[AllocationRecord] {
        &self.allocations
    }

    pub fn removals(&self) -> &[RemovalRecord] {
        &self.removals
    }

    pub fn allocation_for_slot(&self, slot_id: &str) -> Option<&AllocationRecord> {
        self.allocations.iter().find(|a| a.slot.slot_id == slot_id)
    }

    pub fn is_allocated(&self, unit_id: &str) -> bool {
        self.allocations.iter().any(|a| a.unit.unit_id == unit_id)
    }

    pub fn is_marked_for_removal(&self, unit_id: &str) -> bool {
        self.removals.iter().any(|r| r.unit.unit_id == unit_id)
    }

    /// 尚无分配记录的槽位
    pub fn unallocated_slots(&self) -> Vec<&ContractEquipmentSlot> {
        self.slots
            .iter()
            .filter(|s| self.allocation_for_slot(&s.slot_id).is_none())
            .collect()
    }

    pub fn is_fully_allocated(&self) -> bool {
        self.unallocated_slots().is_empty()
    }

    /// 指定品类的第一条分配
    pub fn first_of_category(&self, category: ItemCategory) -> Option<&AllocationRecord> {
        self.allocations.iter().find(|a| a.category() == category)
    }

    /// 分配设备指纹: 已分配实物 id 排序后以逗号拼接
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.allocations)
    }

    pub fn inventory_fingerprint(&self) -> &str {
        &self.inventory_fingerprint
    }

    pub fn load_state(&self) -> AllocationLoadState {
        self.load_state
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state == AllocationLoadState::Loaded
    }

    // ==========================================
    // 开通信号缓存
    // ==========================================

    pub fn signal_status(&self) -> SignalStatus {
        self.signal_status
    }

    pub fn signal_result(&self) -> Option<&str> {
        self.signal_result.as_deref()
    }

    pub fn record_signal_result(&mut self, status: SignalStatus, result: String) {
        self.signal_status = status;
        self.signal_result = Some(result);
    }

    // ==========================================
    // 只读与快照
    // ==========================================

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn snapshot(&self) -> AllocationSnapshot {
        AllocationSnapshot {
            allocations: self.allocations.clone(),
            removals: self.removals.clone(),
            fingerprint: self.fingerprint(),
        }
    }

    /// 用草稿快照覆盖当前分配
    ///
    /// 快照中的槽位必须存在于当前合同，且记录指纹自洽
    pub fn restore(&mut self, snapshot: AllocationSnapshot) -> AllocationResult<()> {
        let actual = fingerprint_of(&snapshot.allocations);
        if actual != snapshot.fingerprint {
            return Err(AllocationError::SnapshotMismatch {
                expected: snapshot.fingerprint,
                actual,
            });
        }
        for record in &snapshot.allocations {
            self.find_slot(&record.slot.slot_id)?;
        }

        self.allocations = snapshot.allocations;
        self.removals = snapshot.removals;
        self.reset_signal();
        debug!(work_id = %self.work_id, fingerprint = %actual, "草稿分配已恢复");
        Ok(())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn ensure_writable(&self) -> AllocationResult<()> {
        if self.read_only {
            return Err(AllocationError::ReadOnly);
        }
        Ok(())
    }

    fn find_slot(&self, slot_id: &str) -> AllocationResult<&ContractEquipmentSlot> {
        self.slots
            .iter()
            .find(|s| s.slot_id == slot_id)
            .ok_or_else(|| AllocationError::UnknownSlot(slot_id.to_string()))
    }

    fn allocation_mut(&mut self, slot_id: &str) -> AllocationResult<&mut AllocationRecord> {
        self.allocations
            .iter_mut()
            .find(|a| a.slot.slot_id == slot_id)
            .ok_or_else(|| AllocationError::UnknownSlot(slot_id.to_string()))
    }

    /// 同槽位替换，否则追加；返回记录下标
    fn put_allocation(&mut self, record: AllocationRecord) -> usize {
        match self
            .allocations
            .iter()
            .position(|a| a.slot.slot_id == record.slot.slot_id)
        {
            Some(i) => {
                let displaced = std::mem::replace(&mut self.allocations[i], record);
                if displaced.unit.unit_id != self.allocations[i].unit.unit_id {
                    self.return_displaced(displaced);
                }
                i
            }
            None => {
                self.allocations.push(record);
                self.allocations.len() - 1
            }
        }
    }

    /// 库存或已装列表中的实物
    fn is_inventory_unit(&self, unit_id: &str) -> bool {
        self.stock
            .iter()
            .chain(self.installed.iter())
            .any(|u| u.unit_id == unit_id)
    }

    /// 被替换或取消的再利用记录: 不在库存/已装列表中的实物回到回收列表
    fn return_displaced(&mut self, record: AllocationRecord) {
        if record.change_tag != ChangeTag::Reuse || self.is_inventory_unit(&record.unit.unit_id) {
            return;
        }
        debug!(
            work_id = %self.work_id,
            unit_id = %record.unit.unit_id,
            "再利用设备被替换, 重新标记回收"
        );
        self.removals
            .push(RemovalRecord::new(record.unit, RemovalOrigin::Reported));
    }

    fn reset_signal(&mut self) {
        self.signal_status = SignalStatus::Unknown;
        self.signal_result = None;
    }

    fn on_mutation(&mut self, op: &str) {
        self.reset_signal();
        debug!(
            work_id = %self.work_id,
            op = op,
            fingerprint = %self.fingerprint(),
            "设备分配已变更"
        );
    }
}

fn fingerprint_of(records: &[AllocationRecord]) -> String {
    let mut ids: Vec<&str> = records.iter().map(|a| a.unit.unit_id.as_str()).collect();
    ids.sort_unstable();
    ids.join(",")
}

#[cfg(test)]
mod tests;
