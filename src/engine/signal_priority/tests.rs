use super::*;
use crate::domain::equipment::{ContractEquipmentSlot, OwnershipFields, StockUnit};
use crate::domain::types::{ChangeTag, ContractStatus, WorkStatus, WorkType};

// ==========================================
// 测试辅助函数
// ==========================================

fn create_test_context(product_group: &str) -> WorkContext {
    WorkContext {
        work_id: "W200".to_string(),
        contract_id: "C200".to_string(),
        customer_id: "CU200".to_string(),
        site_id: "SO2".to_string(),
        work_type: WorkType::Install,
        work_status: WorkStatus::Assigned,
        contract_status: Some(ContractStatus::InstallScheduled),
        product_group: product_group.to_string(),
        base_product_code: "P".to_string(),
        voip_product_code: None,
        isp_product_code: None,
        join_contract_id: None,
        network_class: None,
        previous_contract_id: None,
        certification_required: false,
        transport_code: String::new(),
        market_code: String::new(),
        add_ons: vec![],
    }
}

fn create_test_record(unit_id: &str, category: ItemCategory, class_code: &str) -> AllocationRecord {
    let slot = ContractEquipmentSlot {
        slot_id: format!("S-{}", unit_id),
        category,
        model_code: "MDL".to_string(),
        display_name: "设备".to_string(),
        class_code: class_code.to_string(),
    };
    let unit = StockUnit {
        unit_id: unit_id.to_string(),
        serial_no: String::new(),
        mac_address: Some(format!("MAC-{}", unit_id)),
        category,
        model_code: "MDL".to_string(),
        model_name: String::new(),
        class_code: class_code.to_string(),
        ownership: OwnershipFields::default(),
    };
    AllocationRecord::new(slot, unit, ChangeTag::New)
}

// ==========================================
// 主设备优先级
// ==========================================

#[test]
fn test_fiber_terminal_wins() {
    let ctx = create_test_context("I");
    let allocations = vec![
        create_test_record("STB1", ItemCategory::SetTop, "090401"),
        create_test_record("MDM1", ItemCategory::Modem, "090201"),
        create_test_record("ONT1", ItemCategory::FiberTerminal, "090501"),
    ];
    let plan = SignalPriorityResolver::new().resolve(&allocations, &ctx).unwrap();
    assert_eq!(plan.primary_unit_id.as_deref(), Some("ONT1"));
    assert_eq!(plan.primary_category, Some(ItemCategory::FiberTerminal));
    assert_eq!(plan.msg_id, "SMR03");
}

#[test]
fn test_voip_only_uses_gateway_exclusively() {
    let mut ctx = create_test_context("V");
    ctx.voip_product_code = Some("VOIP1".to_string());
    let allocations = vec![
        create_test_record("ONT1", ItemCategory::FiberTerminal, ""),
        create_test_record("WR1", ItemCategory::WirelessRouter, ""),
    ];
    let resolver = SignalPriorityResolver::new();
    assert!(resolver.primary_unit(&allocations, &ctx).is_none());

    let mut with_gateway = allocations.clone();
    with_gateway.push(create_test_record("GW1", ItemCategory::VoipGateway, ""));
    let plan = resolver.resolve(&with_gateway, &ctx).unwrap();
    assert_eq!(plan.primary_unit_id.as_deref(), Some("GW1"));
    assert_eq!(plan.msg_id, "SMR60");
    // VoIP 单独: etc1 为无线路由器
    assert_eq!(plan.aux.etc_1, "WR1");
}

#[test]
fn test_wireless_router_only_for_internet_group() {
    let allocations = vec![
        create_test_record("WR1", ItemCategory::WirelessRouter, ""),
        create_test_record("STB1", ItemCategory::SetTop, ""),
    ];
    let resolver = SignalPriorityResolver::new();

    let ctx = create_test_context("I");
    assert_eq!(
        resolver.primary_unit(&allocations, &ctx).map(|a| a.unit.unit_id.as_str()),
        Some("WR1")
    );

    let ctx = create_test_context("D");
    assert_eq!(
        resolver.primary_unit(&allocations, &ctx).map(|a| a.unit.unit_id.as_str()),
        Some("STB1")
    );
}

#[test]
fn test_modem_and_settop_request() {
    let ctx = create_test_context("D");
    let allocations = vec![
        create_test_record("MDM1", ItemCategory::Modem, "090201"),
        create_test_record("STB1", ItemCategory::SetTop, "090401"),
    ];
    let resolver = SignalPriorityResolver::new();
    let plan = resolver.resolve(&allocations, &ctx).unwrap();
    assert_eq!(plan.primary_unit_id.as_deref(), Some("MDM1"));
    assert_eq!(plan.set_top_unit_id.as_deref(), Some("STB1"));
    assert_eq!(plan.modem_unit_id.as_deref(), Some("MDM1"));
    assert_eq!(plan.aux.etc_1, "STB1");
    assert_eq!(plan.signal_work_id, "W200");

    let request = resolver.build_request(&plan, &ctx, "TECH01");
    assert_eq!(request.operator_id, "TECH01");
    assert_eq!(request.set_top_unit_id, "STB1");
    assert_eq!(request.modem_unit_id, "MDM1");
    assert_eq!(request.wait_time, "3");
    assert!(request.join_contract_id.is_empty());
}

// ==========================================
// 辅助参数
// ==========================================

#[test]
fn test_aux_params_by_group() {
    let resolver = SignalPriorityResolver::new();
    let allocations = vec![
        create_test_record("SP1", ItemCategory::Special, ""),
        create_test_record("WR1", ItemCategory::WirelessRouter, ""),
        create_test_record("EXT1", ItemCategory::VoipExtension, ""),
        create_test_record("ISP1", ItemCategory::IspTerminal, ""),
    ];

    let mut ctx = create_test_context("A");
    ctx.network_class = Some("NC9".to_string());
    let aux = resolver.aux_params(&allocations, &ctx);
    assert_eq!(aux.etc_1, "NC9");
    assert_eq!(aux.etc_2, "SP1");
    assert!(aux.etc_3.is_empty());

    let ctx = create_test_context("C");
    assert_eq!(resolver.aux_params(&allocations, &ctx).etc_3, "WR1");

    let mut ctx = create_test_context("V");
    assert_eq!(resolver.aux_params(&allocations, &ctx).etc_4, "EXT1");
    ctx.isp_product_code = Some("ISP".to_string());
    assert_eq!(resolver.aux_params(&allocations, &ctx).etc_4, "ISP1");
}

// ==========================================
// 失败场景
// ==========================================

#[test]
fn test_no_equipment_fails() {
    let ctx = create_test_context("I");
    assert_eq!(
        SignalPriorityResolver::new().resolve(&[], &ctx),
        Err(SignalResolveError::NoEquipment)
    );
}

#[test]
fn test_join_contract_preconditions() {
    let resolver = SignalPriorityResolver::new();
    let allocations = vec![create_test_record("MDM1", ItemCategory::Modem, "")];

    let ctx = create_test_context("V");
    assert_eq!(
        resolver.resolve(&allocations, &ctx),
        Err(SignalResolveError::MissingVoipJoinContract)
    );

    let mut ctx = create_test_context("I");
    ctx.isp_product_code = Some("ISP".to_string());
    assert_eq!(
        resolver.resolve(&allocations, &ctx),
        Err(SignalResolveError::MissingIspJoinContract)
    );

    ctx.join_contract_id = Some("JOIN1".to_string());
    let plan = resolver.resolve(&allocations, &ctx).unwrap();
    let request = resolver.build_request(&plan, &ctx, "TECH01");
    assert_eq!(request.join_contract_id, "JOIN1");
}

#[test]
fn test_no_signal_equipment_fails() {
    let ctx = create_test_context("D");
    let allocations = vec![create_test_record("SP1", ItemCategory::Special, "")];
    assert_eq!(
        SignalPriorityResolver::new().resolve(&allocations, &ctx),
        Err(SignalResolveError::NoSignalEquipment)
    );
}

#[test]
fn test_class_prefix_counts_as_set_top() {
    let ctx = create_test_context("D");
    let allocations = vec![create_test_record("X1", ItemCategory::Other, "090499")];
    let plan = SignalPriorityResolver::new().resolve(&allocations, &ctx).unwrap();
    assert!(plan.primary_unit_id.is_none());
    assert_eq!(plan.set_top_unit_id.as_deref(), Some("X1"));
}

// ==========================================
// 信号作业 id
// ==========================================

#[test]
fn test_signal_work_id_selection() {
    let ctx = create_test_context("D");
    let resolver = SignalPriorityResolver::new();

    let allocations = vec![
        create_test_record("MDM1", ItemCategory::Modem, ""),
        create_test_record("OTT1", ItemCategory::SetTop, "092201"),
    ];
    assert_eq!(
        resolver.resolve(&allocations, &ctx).unwrap().signal_work_id,
        "MAC-OTT1"
    );

    let mut allocations = allocations;
    allocations.push(create_test_record("AP1", ItemCategory::VoipExtension, "091003"));
    assert_eq!(resolver.resolve(&allocations, &ctx).unwrap().signal_work_id, "AP1");
}
