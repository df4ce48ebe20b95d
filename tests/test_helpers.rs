// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时草稿数据库、工单/库存构造、远端协作方替身
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use field_work_certify::api::WorkServices;
use field_work_certify::db::open_sqlite_connection;
use field_work_certify::domain::equipment::{
    ContractEquipmentSlot, InventorySnapshot, OwnershipFields, StockUnit,
};
use field_work_certify::domain::protocol::{
    ActivationRequest, ActivationResponse, CertificationQuery, DirectoryLookupRequest,
    DirectoryUnlinkRequest, DuplicateCheckRequest, EquipmentListRequest, LineDetailRequest,
    LineRegistrationRequest, PortListRequest, SignalRequest, SignalResponse, SubscriptionInfo,
    SubscriptionRequest, SubscriptionResponse,
};
use field_work_certify::domain::types::{ContractStatus, ItemCategory, WorkStatus, WorkType};
use field_work_certify::domain::work::WorkContext;
use field_work_certify::engine::events::{
    OptionalEventPublisher, WorkEvent, WorkEventPublisher,
};
use field_work_certify::engine::gateways::{
    CertifyGateway, GatewayError, GatewayResult, InventoryService, SignalGateway,
};
use field_work_certify::repository::DraftStore;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub const OPERATOR: &str = "TECH01";

/// 创建临时草稿数据库
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();
    Ok((temp_file, db_path))
}

/// 打开共享连接
pub fn open_shared_connection(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_sqlite_connection(db_path).unwrap()))
}

// ==========================================
// 工单 / 库存构造
// ==========================================

/// 光纤认证产品的新装工单
pub fn create_test_context(work_id: &str, transport_code: &str) -> WorkContext {
    WorkContext {
        work_id: work_id.to_string(),
        contract_id: format!("C-{}", work_id),
        customer_id: "CU-1".to_string(),
        site_id: "SO3".to_string(),
        work_type: WorkType::Install,
        work_status: WorkStatus::Assigned,
        contract_status: Some(ContractStatus::InstallScheduled),
        product_group: "I".to_string(),
        base_product_code: "P100".to_string(),
        voip_product_code: None,
        isp_product_code: None,
        join_contract_id: None,
        network_class: None,
        previous_contract_id: None,
        certification_required: true,
        transport_code: transport_code.to_string(),
        market_code: "MK1".to_string(),
        add_ons: vec![],
    }
}

pub fn create_test_slot(slot_id: &str, category: ItemCategory) -> ContractEquipmentSlot {
    ContractEquipmentSlot {
        slot_id: slot_id.to_string(),
        category,
        model_code: "MDL".to_string(),
        display_name: "设备".to_string(),
        class_code: String::new(),
    }
}

pub fn create_test_unit(unit_id: &str, category: ItemCategory) -> StockUnit {
    StockUnit {
        unit_id: unit_id.to_string(),
        serial_no: format!("SN-{}", unit_id),
        mac_address: Some(format!("MAC-{}", unit_id)),
        category,
        model_code: "MDL".to_string(),
        model_name: "Model".to_string(),
        class_code: String::new(),
        ownership: OwnershipFields::default(),
    }
}

/// 光终端 + AP 两个槽位，库存各两台
pub fn create_test_inventory() -> InventorySnapshot {
    InventorySnapshot {
        contract_slots: vec![
            create_test_slot("S-ONT", ItemCategory::FiberTerminal),
            create_test_slot("S-AP", ItemCategory::VoipExtension),
        ],
        stock_units: vec![
            create_test_unit("ONT1", ItemCategory::FiberTerminal),
            create_test_unit("ONT2", ItemCategory::FiberTerminal),
            create_test_unit("AP1", ItemCategory::VoipExtension),
        ],
        installed_units: vec![],
        removed_units: vec![],
    }
}

// ==========================================
// 库存服务替身
// ==========================================
pub struct FakeInventoryService {
    pub snapshot: Mutex<InventorySnapshot>,
    pub loads: Mutex<usize>,
}

impl FakeInventoryService {
    pub fn new(snapshot: InventorySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            loads: Mutex::new(0),
        }
    }

    pub fn replace(&self, snapshot: InventorySnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }
}

#[async_trait]
impl InventoryService for FakeInventoryService {
    async fn load_inventory(
        &self,
        _ctx: &WorkContext,
        _operator_id: &str,
    ) -> GatewayResult<InventorySnapshot> {
        *self.loads.lock().unwrap() += 1;
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

// ==========================================
// 开通信号替身
// ==========================================
pub struct FakeSignalGateway {
    pub result: Mutex<GatewayResult<SignalResponse>>,
    pub requests: Mutex<Vec<SignalRequest>>,
}

impl FakeSignalGateway {
    pub fn succeeding() -> Self {
        Self::with_result(Ok(SignalResponse {
            result: "TRUE:0000".to_string(),
            message: String::new(),
        }))
    }

    pub fn with_result(result: GatewayResult<SignalResponse>) -> Self {
        Self {
            result: Mutex::new(result),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SignalGateway for FakeSignalGateway {
    async fn send_signal(&self, request: &SignalRequest) -> GatewayResult<SignalResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.result.lock().unwrap().clone()
    }
}

// ==========================================
// 认证后端替身（全部成功的默认剧本）
// ==========================================
pub struct FakeCertifyGateway {
    pub existing_subscription: Mutex<Option<SubscriptionInfo>>,
    pub activation_code: Mutex<String>,
    pub fail_activation: Mutex<bool>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCertifyGateway {
    pub fn new() -> Self {
        Self {
            existing_subscription: Mutex::new(None),
            activation_code: Mutex::new("SUCCESS".to_string()),
            fail_activation: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == name)
            .count()
    }
}

fn ok_subscription(subscription_no: Option<&str>) -> SubscriptionResponse {
    SubscriptionResponse {
        result_code: "Y".to_string(),
        message: String::new(),
        subscription_no: subscription_no.map(String::from),
        request_no: subscription_no.map(|_| "REQ-1".to_string()),
    }
}

#[async_trait]
impl CertifyGateway for FakeCertifyGateway {
    async fn query_subscription(&self, _contract_id: &str) -> GatewayResult<Option<SubscriptionInfo>> {
        self.record("query_subscription");
        Ok(self.existing_subscription.lock().unwrap().clone())
    }

    async fn register_subscription(
        &self,
        _request: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResponse> {
        self.record("register_subscription");
        Ok(ok_subscription(Some("SUB-1")))
    }

    async fn cancel_subscription(
        &self,
        _request: &SubscriptionRequest,
        _subscription_no: &str,
    ) -> GatewayResult<SubscriptionResponse> {
        self.record("cancel_subscription");
        Ok(ok_subscription(None))
    }

    async fn lookup_directory(&self, _request: &DirectoryLookupRequest) -> GatewayResult<Value> {
        self.record("lookup_directory");
        Ok(json!([{ "ont_eqt_no": "ONT1", "ont_mac_addr": "MAC-ONT1", "ap_eqt_no": "AP1" }]))
    }

    async fn unlink_directory(&self, _request: &DirectoryUnlinkRequest) -> GatewayResult<Value> {
        self.record("unlink_directory");
        Ok(json!({ "RESULT_CD": "Y" }))
    }

    async fn query_network_line(&self, _contract_id: &str, _subscription_no: &str) -> GatewayResult<Value> {
        self.record("query_network_line");
        Ok(json!({
            "RESULT_CD": "Y",
            "EQIP_ID": "L2-100",
            "PRT_INDX_NM": "1/0/3",
            "MDL_NM": "L2SW",
            "OLT_ID": "OLT-9",
            "OLT_PORT": "2/1"
        }))
    }

    async fn list_network_nodes(&self, _request: &EquipmentListRequest) -> GatewayResult<Value> {
        self.record("list_network_nodes");
        Ok(json!({ "output": [{ "eqip_id": "RN-1", "eqip_nm": "RN one" }] }))
    }

    async fn list_ports(&self, _request: &PortListRequest) -> GatewayResult<Value> {
        self.record("list_ports");
        Ok(json!([
            { "port_no": "1", "pt_use": "N" },
            { "port_no": "2", "pt_use": "Y", "entr_no": "OTHER-SUB" }
        ]))
    }

    async fn query_line_detail(&self, _request: &LineDetailRequest) -> GatewayResult<Value> {
        self.record("query_line_detail");
        Ok(json!({ "t": "T", "ont_mac": "mac-ont1", "ip": "10.0.0.2" }))
    }

    async fn check_duplicate(&self, _request: &DuplicateCheckRequest) -> GatewayResult<Value> {
        self.record("check_duplicate");
        Ok(json!({ "RESULT_CD": "Y", "ENTR_EXIST": "N" }))
    }

    async fn register_line(&self, _request: &LineRegistrationRequest) -> GatewayResult<Value> {
        self.record("register_line");
        Ok(json!({ "RESULT_CD": "Y", "RESULT_MSG": "OK" }))
    }

    async fn activate(&self, _request: &ActivationRequest) -> GatewayResult<ActivationResponse> {
        self.record("activate");
        if *self.fail_activation.lock().unwrap() {
            return Err(GatewayError::remote("activate", "connection reset"));
        }
        Ok(ActivationResponse {
            code: self.activation_code.lock().unwrap().clone(),
            message: "remote message".to_string(),
        })
    }

    async fn query_certification(&self, _query: &CertificationQuery) -> GatewayResult<Value> {
        self.record("query_certification");
        Ok(json!({ "ERROR": "not certified" }))
    }

    async fn list_eligible_sites(&self) -> GatewayResult<Vec<String>> {
        self.record("list_eligible_sites");
        Ok(vec!["SO3".to_string()])
    }

    async fn terminate(&self, _query: &CertificationQuery) -> GatewayResult<Value> {
        self.record("terminate");
        Ok(json!({ "RESULT": "DONE" }))
    }
}

// ==========================================
// 事件收集
// ==========================================
#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<WorkEvent>>,
}

impl RecordingPublisher {
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.kind.as_str().to_string())
            .collect()
    }
}

impl WorkEventPublisher for RecordingPublisher {
    fn publish(&self, event: WorkEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.events.lock().unwrap().push(event);
        Ok(String::new())
    }
}

// ==========================================
// 会话依赖组装
// ==========================================
pub struct TestHarness {
    pub inventory: Arc<FakeInventoryService>,
    pub signal: Arc<FakeSignalGateway>,
    pub certify: Arc<FakeCertifyGateway>,
    pub drafts: Arc<dyn DraftStore>,
    pub events: Arc<RecordingPublisher>,
}

impl TestHarness {
    pub fn new(drafts: Arc<dyn DraftStore>) -> Self {
        Self {
            inventory: Arc::new(FakeInventoryService::new(create_test_inventory())),
            signal: Arc::new(FakeSignalGateway::succeeding()),
            certify: Arc::new(FakeCertifyGateway::new()),
            drafts,
            events: Arc::new(RecordingPublisher::default()),
        }
    }

    pub fn services(&self) -> WorkServices {
        WorkServices::new(
            self.inventory.clone(),
            self.signal.clone(),
            self.certify.clone(),
            self.drafts.clone(),
        )
        .with_events(OptionalEventPublisher::with_publisher(self.events.clone()))
    }
}
