use super::*;
use crate::domain::equipment::OwnershipFields;

// ==========================================
// 测试辅助函数
// ==========================================

fn create_test_slot(slot_id: &str, category: ItemCategory, model_code: &str) -> ContractEquipmentSlot {
    ContractEquipmentSlot {
        slot_id: slot_id.to_string(),
        category,
        model_code: model_code.to_string(),
        display_name: format!("槽位-{}", slot_id),
        class_code: String::new(),
    }
}

fn create_test_unit(unit_id: &str, category: ItemCategory, model_code: &str) -> StockUnit {
    StockUnit {
        unit_id: unit_id.to_string(),
        serial_no: format!("SN-{}", unit_id),
        mac_address: Some(format!("MAC-{}", unit_id)),
        category,
        model_code: model_code.to_string(),
        model_name: String::new(),
        class_code: String::new(),
        ownership: OwnershipFields::default(),
    }
}

/// 两个槽位（调制解调器 + 机顶盒），三台库存
fn create_loaded_store() -> AllocationStore {
    let mut store = AllocationStore::new("W001");
    store.begin_load();
    store.load(InventorySnapshot {
        contract_slots: vec![
            create_test_slot("S1", ItemCategory::Modem, "M1"),
            create_test_slot("S2", ItemCategory::SetTop, "T1"),
        ],
        stock_units: vec![
            create_test_unit("U1", ItemCategory::Modem, "M1"),
            create_test_unit("U2", ItemCategory::Modem, "M1"),
            create_test_unit("U3", ItemCategory::SetTop, "T1"),
        ],
        installed_units: vec![],
        removed_units: vec![],
    });
    store
}

// ==========================================
// 加载
// ==========================================

#[test]
fn test_load_binds_installed_units_by_category() {
    let mut store = AllocationStore::new("W001");
    assert_eq!(store.load_state(), AllocationLoadState::NotLoaded);
    store.begin_load();
    assert_eq!(store.load_state(), AllocationLoadState::Loading);

    store.load(InventorySnapshot {
        contract_slots: vec![create_test_slot("S1", ItemCategory::Modem, "M1")],
        stock_units: vec![],
        installed_units: vec![
            create_test_unit("I1", ItemCategory::Modem, "OLD"),
            create_test_unit("I2", ItemCategory::SetTop, "T9"),
        ],
        removed_units: vec![create_test_unit("R1", ItemCategory::Modem, "M1")],
    });

    assert!(store.is_loaded());
    assert_eq!(store.allocations().len(), 1);
    assert_eq!(store.allocation_for_slot("S1").unwrap().unit.unit_id, "I1");
    assert_eq!(store.installed().len(), 2);
    assert_eq!(store.removals().len(), 1);
    assert_eq!(store.removals()[0].origin, RemovalOrigin::Reported);
    assert_eq!(store.inventory_fingerprint(), "I1,I2,R1");
}

#[test]
fn test_load_skips_installed_unit_already_removed() {
    let mut store = AllocationStore::new("W001");
    store.load(InventorySnapshot {
        contract_slots: vec![create_test_slot("S1", ItemCategory::Modem, "M1")],
        stock_units: vec![],
        installed_units: vec![create_test_unit("X", ItemCategory::Modem, "M1")],
        removed_units: vec![create_test_unit("X", ItemCategory::Modem, "M1")],
    });

    assert!(store.allocations().is_empty());
    assert!(store.is_marked_for_removal("X"));
}

// ==========================================
// 分配
// ==========================================

#[test]
fn test_assign_and_replace() {
    let mut store = create_loaded_store();

    store.assign("S1", "U1").unwrap();
    assert_eq!(store.fingerprint(), "U1");

    // 同槽位重新分配 → 替换
    let record = store.assign("S1", "U2").unwrap();
    assert_eq!(record.unit.unit_id, "U2");
    assert_eq!(record.change_tag, ChangeTag::New);
    assert_eq!(store.allocations().len(), 1);

    let available: Vec<&str> = store
        .available_stock("S1")
        .iter()
        .map(|u| u.unit_id.as_str())
        .collect();
    assert_eq!(available, vec!["U1"]);
}

#[test]
fn test_assign_rejects_unit_held_by_other_slot() {
    let mut store = AllocationStore::new("W001");
    store.load(InventorySnapshot {
        contract_slots: vec![
            create_test_slot("S1", ItemCategory::Modem, "M1"),
            create_test_slot("S2", ItemCategory::Modem, "M1"),
        ],
        stock_units: vec![create_test_unit("U1", ItemCategory::Modem, "M1")],
        installed_units: vec![],
        removed_units: vec![],
    });

    store.assign("S1", "U1").unwrap();
    let err = store.assign("S2", "U1").unwrap_err();
    assert_eq!(
        err,
        AllocationError::UnitAlreadyAllocated {
            unit_id: "U1".to_string(),
            slot_id: "S1".to_string(),
        }
    );
}

#[test]
fn test_assign_errors() {
    let mut store = create_loaded_store();

    assert_eq!(
        store.assign("NOPE", "U1").unwrap_err(),
        AllocationError::UnknownSlot("NOPE".to_string())
    );
    assert_eq!(
        store.assign("S1", "ZZZ").unwrap_err(),
        AllocationError::UnknownUnit("ZZZ".to_string())
    );
    assert!(matches!(
        store.assign("S1", "U3").unwrap_err(),
        AllocationError::SlotMismatch { .. }
    ));
}

#[test]
fn test_unassign() {
    let mut store = create_loaded_store();
    store.assign("S2", "U3").unwrap();

    let removed = store.unassign("S2").unwrap();
    assert_eq!(removed.unwrap().unit.unit_id, "U3");
    assert!(store.unassign("S2").unwrap().is_none());
    assert_eq!(store.unallocated_slots().len(), 2);
}

// ==========================================
// 回收与再利用
// ==========================================

#[test]
fn test_recover_moves_allocation_to_removals() {
    let mut store = create_loaded_store();
    store.assign("S1", "U1").unwrap();

    assert_eq!(store.recover("U1").unwrap(), RecoverOutcome::Recovered);
    assert!(!store.is_allocated("U1"));
    assert!(store.is_marked_for_removal("U1"));
    assert_eq!(store.removals()[0].origin, RemovalOrigin::Recovered);

    // 回收中的设备不可再分配
    assert_eq!(
        store.assign("S1", "U1").unwrap_err(),
        AllocationError::UnitMarkedForRemoval("U1".to_string())
    );
    assert!(store.available_stock("S1").iter().all(|u| u.unit_id != "U1"));
}

#[test]
fn test_recover_is_noop_for_removed_unit() {
    let mut store = create_loaded_store();
    store.assign("S1", "U1").unwrap();
    store.recover("U1").unwrap();
    store.record_signal_result(SignalStatus::Succeeded, "TRUE".to_string());

    assert_eq!(store.recover("U1").unwrap(), RecoverOutcome::AlreadyMarked);
    assert_eq!(store.removals().len(), 1);
    // 无变更，不清空信号
    assert_eq!(store.signal_status(), SignalStatus::Succeeded);
}

#[test]
fn test_reuse_clears_removal_and_flags() {
    let mut store = create_loaded_store();
    store.assign("S1", "U1").unwrap();
    store.recover("U1").unwrap();
    store
        .set_loss_flags(
            "U1",
            LossFlags {
                cable_lost: true,
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(store.reusable_removals("S1").len(), 1);
    assert!(store.reusable_removals("S2").is_empty());

    let record = store.reuse("U1", "S1").unwrap();
    assert_eq!(record.change_tag, ChangeTag::Reuse);
    assert!(!store.is_marked_for_removal("U1"));
    assert!(store.is_allocated("U1"));
}

#[test]
fn test_reuse_rejects_mismatched_slot() {
    let mut store = create_loaded_store();
    store.assign("S1", "U1").unwrap();
    store.recover("U1").unwrap();

    assert!(matches!(
        store.reuse("U1", "S2").unwrap_err(),
        AllocationError::SlotMismatch { .. }
    ));
    assert!(store.is_marked_for_removal("U1"));
}

/// 两个槽位，一台库存 U1，后端回收清单中一台调制解调器 R1
fn create_store_with_reported_removal() -> AllocationStore {
    let mut store = AllocationStore::new("W001");
    store.begin_load();
    store.load(InventorySnapshot {
        contract_slots: vec![
            create_test_slot("S1", ItemCategory::Modem, "M1"),
            create_test_slot("S2", ItemCategory::SetTop, "T1"),
        ],
        stock_units: vec![create_test_unit("U1", ItemCategory::Modem, "M1")],
        installed_units: vec![],
        removed_units: vec![create_test_unit("R1", ItemCategory::Modem, "M1")],
    });
    store
}

#[test]
fn test_replacing_reused_reported_unit_returns_it_to_removals() {
    let mut store = create_store_with_reported_removal();
    store.reuse("R1", "S1").unwrap();

    store.assign("S1", "U1").unwrap();

    assert!(!store.is_allocated("R1"));
    assert!(store.is_marked_for_removal("R1"));
    assert_eq!(store.reusable_removals("S1").len(), 1);
    assert_eq!(store.recover("R1").unwrap(), RecoverOutcome::AlreadyMarked);
}

#[test]
fn test_unassigning_reused_reported_unit_returns_it_to_removals() {
    let mut store = create_store_with_reported_removal();
    store.reuse("R1", "S1").unwrap();

    let removed = store.unassign("S1").unwrap().unwrap();

    assert_eq!(removed.unit.unit_id, "R1");
    assert!(store.is_marked_for_removal("R1"));
    assert_eq!(store.removals()[0].origin, RemovalOrigin::Reported);
    assert_eq!(store.removals()[0].flags, LossFlags::default());
}

#[test]
fn test_replacing_reused_stock_unit_returns_it_to_stock() {
    let mut store = create_loaded_store();
    store.assign("S1", "U1").unwrap();
    store.recover("U1").unwrap();
    store.reuse("U1", "S1").unwrap();

    store.assign("S1", "U2").unwrap();

    assert!(store.removals().is_empty());
    assert!(store.available_stock("S1").iter().any(|u| u.unit_id == "U1"));
}

#[test]
fn test_cancel_recovery_returns_unit_to_stock() {
    let mut store = create_loaded_store();
    store.assign("S1", "U1").unwrap();
    store.recover("U1").unwrap();
    store
        .set_loss_flags(
            "U1",
            LossFlags {
                unit_lost: true,
                ..Default::default()
            },
        )
        .unwrap();
    store.record_signal_result(SignalStatus::Succeeded, "TRUE".to_string());

    let removal = store.cancel_recovery("U1").unwrap();

    assert!(removal.flags.unit_lost);
    assert!(!store.is_marked_for_removal("U1"));
    assert!(!store.is_allocated("U1"));
    assert!(store.available_stock("S1").iter().any(|u| u.unit_id == "U1"));
    assert_eq!(store.signal_status(), SignalStatus::Unknown);
    store.assign("S1", "U1").unwrap();
}

#[test]
fn test_cancel_recovery_errors() {
    let mut store = create_store_with_reported_removal();
    assert_eq!(
        store.cancel_recovery("R1").unwrap_err(),
        AllocationError::ReportedRemoval("R1".to_string())
    );
    assert!(store.is_marked_for_removal("R1"));

    // 再利用后再回收，仍是后端回收清单中的设备
    store.reuse("R1", "S1").unwrap();
    store.recover("R1").unwrap();
    assert_eq!(
        store.cancel_recovery("R1").unwrap_err(),
        AllocationError::ReportedRemoval("R1".to_string())
    );

    assert_eq!(
        store.cancel_recovery("U1").unwrap_err(),
        AllocationError::UnitNotMarkedForRemoval("U1".to_string())
    );

    store.set_read_only(true);
    assert_eq!(store.cancel_recovery("R1").unwrap_err(), AllocationError::ReadOnly);
}

// ==========================================
// 信号缓存与只读
// ==========================================

#[test]
fn test_mutation_clears_signal_status() {
    let mut store = create_loaded_store();
    store.assign("S1", "U1").unwrap();
    store.record_signal_result(SignalStatus::Succeeded, "TRUE|OK".to_string());
    assert_eq!(store.signal_result(), Some("TRUE|OK"));

    store
        .set_install_location("S1", Some("客厅".to_string()))
        .unwrap();
    assert_eq!(store.signal_status(), SignalStatus::Unknown);
    assert!(store.signal_result().is_none());
}

#[test]
fn test_read_only_blocks_mutations() {
    let mut store = create_loaded_store();
    store.set_read_only(true);

    assert_eq!(store.assign("S1", "U1").unwrap_err(), AllocationError::ReadOnly);
    assert_eq!(store.recover("U1").unwrap_err(), AllocationError::ReadOnly);
    assert_eq!(
        store.set_mac_override("S1", None).unwrap_err(),
        AllocationError::ReadOnly
    );
}

// ==========================================
// 快照
// ==========================================

#[test]
fn test_snapshot_restore() {
    let mut store = create_loaded_store();
    store.assign("S1", "U2").unwrap();
    store.assign("S2", "U3").unwrap();
    store.recover("U2").unwrap();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.fingerprint, "U3");

    let mut fresh = create_loaded_store();
    fresh.restore(snapshot).unwrap();
    assert_eq!(fresh.fingerprint(), "U3");
    assert!(fresh.is_marked_for_removal("U2"));
}

#[test]
fn test_restore_rejects_inconsistent_snapshot() {
    let mut store = create_loaded_store();
    store.assign("S1", "U1").unwrap();
    let mut snapshot = store.snapshot();
    snapshot.fingerprint = "U9".to_string();

    let mut fresh = create_loaded_store();
    assert!(matches!(
        fresh.restore(snapshot).unwrap_err(),
        AllocationError::SnapshotMismatch { .. }
    ));
    assert!(fresh.allocations().is_empty());
}
