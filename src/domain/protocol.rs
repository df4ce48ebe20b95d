// ==========================================
// 现场工单系统 - 外部协议报文
// ==========================================
// 职责: 远端接口的请求/响应结构，以及边界处的字段名归一化
// 约束: 字段名统一转大写，空串视为缺失；内部逻辑不再探测多种字段名
// ==========================================

use crate::domain::certification::{
    BindingKind, DeviceInfo, DirectoryBinding, NetworkNode, PortInfo,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 归一化后的记录: 大写字段名 → 字符串值
pub type NormalizedRecord = BTreeMap<String, String>;

/// 将单条 JSON 记录的字段名归一化为大写
///
/// 非对象输入返回空记录；null 字段丢弃；数字/布尔转为字符串
pub fn normalize_record(value: &Value) -> NormalizedRecord {
    let mut record = NormalizedRecord::new();
    if let Value::Object(map) = value {
        for (key, v) in map {
            let text = match v {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => other.to_string(),
            };
            record.insert(key.trim().to_uppercase(), text);
        }
    }
    record
}

/// 归一化记录列表；兼容 `{ "output": [...] }` 与单对象两种包装
pub fn normalize_records(value: &Value) -> Vec<NormalizedRecord> {
    match value {
        Value::Array(items) => items.iter().map(normalize_record).collect(),
        Value::Object(map) => match map.get("output").or_else(|| map.get("data")) {
            Some(inner @ Value::Array(_)) => normalize_records(inner),
            _ => vec![normalize_record(value)],
        },
        _ => Vec::new(),
    }
}

/// 读取非空字段
pub fn field(record: &NormalizedRecord, key: &str) -> Option<String> {
    record
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// RESULT_CD 以 "N" 开头即失败
pub fn result_code_failed(code: &str) -> bool {
    code.trim().to_uppercase().starts_with('N')
}

// ==========================================
// 加入 (subscription)
// ==========================================

/// 已有加入信息 (getUplsCtrtInfo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub subscription_no: String,
    pub request_no: Option<String>,
}

/// 加入登记/取消请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub work_id: String,
    pub contract_id: String,
    pub market_code: String,
    pub operator_id: String,
}

/// 加入登记/取消响应 (RESULT_CD: Y/N)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub result_code: String,
    pub message: String,
    pub subscription_no: Option<String>,
    pub request_no: Option<String>,
}

impl SubscriptionResponse {
    pub fn is_success(&self) -> bool {
        self.result_code.trim().eq_ignore_ascii_case("Y")
    }
}

// ==========================================
// 目录关联 (directory link)
// ==========================================

/// 目录查询中的设备引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUnitRef {
    pub unit_id: String,
    pub mac_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryLookupRequest {
    pub work_id: String,
    pub contract_id: String,
    pub customer_id: String,
    pub site_id: String,
    pub operator_id: String,
    pub terminal: Option<DirectoryUnitRef>,
    pub access_point: Option<DirectoryUnitRef>,
}

/// 目录绑定解除请求（重新加入时清理旧绑定）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUnlinkRequest {
    pub contract_id: String,
    pub subscription_no: String,
    pub operator_id: String,
    pub binding: DirectoryBinding,
}

/// 目录查询结果转换为绑定列表
///
/// 取首条记录的 ONT_EQT_NO/ONT_MAC_ADDR 与 AP_EQT_NO/AP_MAC_ADDR
pub fn directory_bindings(records: &[NormalizedRecord]) -> Vec<DirectoryBinding> {
    let Some(record) = records.first() else {
        return Vec::new();
    };
    let mut bindings = Vec::new();
    if let Some(unit_id) = field(record, "ONT_EQT_NO") {
        bindings.push(DirectoryBinding {
            kind: BindingKind::Terminal,
            unit_id,
            mac_address: field(record, "ONT_MAC_ADDR"),
        });
    }
    if let Some(unit_id) = field(record, "AP_EQT_NO") {
        bindings.push(DirectoryBinding {
            kind: BindingKind::AccessPoint,
            unit_id,
            mac_address: field(record, "AP_MAC_ADDR"),
        });
    }
    bindings
}

// ==========================================
// 线路查询 (line query)
// ==========================================

/// 网络线路查询结果 (getUplsNwcs)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLineInfo {
    pub result_code: String,
    pub message: String,
    pub equipment_id: Option<String>,
    pub port_name: Option<String>,
    pub model_name: Option<String>,
    pub site_name: Option<String>,
    pub olt_id: Option<String>,
    pub olt_port: Option<String>,
}

impl NetworkLineInfo {
    pub fn from_record(record: &NormalizedRecord) -> Self {
        Self {
            result_code: field(record, "RESULT_CD").unwrap_or_default(),
            message: field(record, "RESULT_MSG").unwrap_or_default(),
            equipment_id: field(record, "EQIP_ID"),
            port_name: field(record, "PRT_INDX_NM"),
            model_name: field(record, "MDL_NM"),
            site_name: field(record, "ESTB_PLC_NM"),
            olt_id: field(record, "OLT_ID"),
            olt_port: field(record, "OLT_PORT"),
        }
    }

    pub fn is_success(&self) -> bool {
        !result_code_failed(&self.result_code)
    }
}

/// 设备列表请求 (getUplsEqipInfo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentListRequest {
    pub command: String,
    pub subscription_no: String,
    /// A/S 时为 "null"
    pub request_no: String,
    pub biz_type: String,
    pub contract_id: String,
}

/// 端口列表请求 (getUplsEqipPortInfo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortListRequest {
    pub command: String,
    pub subscription_no: String,
    pub equipment_id: String,
    pub contract_id: String,
}

/// 集线详情请求 (CL-03)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDetailRequest {
    pub contract_id: String,
    pub customer_id: String,
    pub site_id: String,
    pub work_id: String,
    pub operator_id: String,
    pub ont_mac: Option<String>,
    pub ont_serial: Option<String>,
    pub ap_mac: Option<String>,
}

impl NetworkNode {
    pub fn from_record(record: &NormalizedRecord) -> Option<Self> {
        let node_id = field(record, "EQIP_ID")?;
        Some(Self {
            node_name: field(record, "EQIP_NM").unwrap_or_else(|| node_id.clone()),
            node_id,
            model_name: field(record, "MDL_NM"),
            site_name: field(record, "ESTB_PLC_NM"),
        })
    }
}

impl PortInfo {
    pub fn from_record(record: &NormalizedRecord) -> Option<Self> {
        let port_no = field(record, "PORT_NO")?;
        Some(Self {
            port_no,
            in_use: field(record, "PT_USE")
                .map(|v| v.eq_ignore_ascii_case("Y"))
                .unwrap_or(false),
            subscriber_no: field(record, "ENTR_NO"),
        })
    }
}

impl DeviceInfo {
    /// 终端 MAC/序列号统一转大写
    pub fn from_record(record: &NormalizedRecord) -> Self {
        Self {
            device_type: field(record, "T"),
            ont_mac: field(record, "ONT_MAC").map(|v| v.to_uppercase()),
            ont_serial: field(record, "ONT_SERIAL").map(|v| v.to_uppercase()),
            ap_mac: field(record, "AP_MAC"),
            device_id: field(record, "DEV_ID"),
            ip: field(record, "IP"),
            port: field(record, "PORT"),
            max_speed: field(record, "MAX_SPEED"),
            status: field(record, "ST"),
        }
    }
}

// ==========================================
// 线路登记 (line registration)
// ==========================================

/// 重复加入者检查请求（光宽带专用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCheckRequest {
    pub subscription_no: String,
    pub equipment_id: String,
    /// 端口名中 "/" 替换为 "__"
    pub port_name: String,
    pub contract_id: String,
}

impl DuplicateCheckRequest {
    pub fn port_name_for(port: &str) -> String {
        port.replace('/', "__")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCheckResult {
    pub success: bool,
    pub subscriber_exists: bool,
    pub message: String,
}

impl DuplicateCheckResult {
    pub fn from_record(record: &NormalizedRecord) -> Self {
        let code = field(record, "RESULT_CD").unwrap_or_default();
        let message = field(record, "RESULT_MSG").unwrap_or_default();
        if result_code_failed(&code) {
            return Self {
                success: false,
                subscriber_exists: false,
                message,
            };
        }
        Self {
            success: true,
            subscriber_exists: field(record, "ENTR_EXIST")
                .map(|v| v.eq_ignore_ascii_case("Y"))
                .unwrap_or(false),
            message,
        }
    }
}

/// 线路登记请求 (setUplsWorkComplete)，十六个字段全部必传
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRegistrationRequest {
    pub op_code: String,          // OPLN_KD_CD
    pub subscription_no: String,  // ENTR_NO
    pub request_no: String,       // ENTR_RQST_NO
    pub biz_type: String,         // BIZ_TYPE
    pub olt_id: String,           // OLT_ID（光宽带为空）
    pub olt_port: String,         // OLT_PORT（光宽带为空）
    pub equipment_id: String,     // EQIP_ID
    pub equipment_port: String,   // EQIP_PORT_NO
    pub system_division: String,  // SYS_DIVS
    pub process_kind: String,     // PRSS_KD
    pub customer_division: String, // CUST_DIVS
    pub equipment_division: String, // EQIP_DIVS
    pub device_division: String,  // DVIC_DIVS
    pub user_id: String,          // USR_ID
    pub delete_flag: String,      // DEL_YN
    pub contract_id: String,      // CTRT_ID
}

/// 通用远端结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResult {
    pub success: bool,
    pub result_code: String,
    pub message: String,
}

impl RemoteResult {
    pub fn from_result_code(code: &str, message: &str) -> Self {
        Self {
            success: !result_code_failed(code),
            result_code: code.to_string(),
            message: message.to_string(),
        }
    }
}

// ==========================================
// 开通 / 认证状态 / 解除
// ==========================================

/// 服务开通请求 (CL-04)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRequest {
    pub contract_id: String,
    pub customer_id: String,
    pub work_id: String,
    pub site_id: String,
    pub operator_id: String,
    pub certify_type: Option<String>,
    pub equipment_id: String,
    pub equipment_port: String,
    pub equipment_model: Option<String>,
    pub equipment_division: String,
    pub site_name: Option<String>,
    pub device: DeviceInfo,
    pub reason: String,
    pub previous_contract_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationResponse {
    pub code: String,
    pub message: String,
}

/// 认证状态查询 (CL-08) / 认证解除 (CL-06) 请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationQuery {
    pub contract_id: String,
    pub customer_id: String,
    pub site_id: String,
    pub operator_id: String,
    pub work_id: String,
}

/// 认证状态 (CL-08)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationStatus {
    pub contract_id: Option<String>,
    pub error: Option<String>,
}

impl CertificationStatus {
    pub fn from_record(record: &NormalizedRecord) -> Self {
        Self {
            contract_id: field(record, "CONT_ID"),
            error: field(record, "ERROR"),
        }
    }

    /// 无错误且 CONT_ID 与合同一致即为已认证
    pub fn is_certified_for(&self, contract_id: &str) -> bool {
        self.error.is_none() && self.contract_id.as_deref() == Some(contract_id)
    }
}

// ==========================================
// 开通信号 (activation signal)
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRequest {
    pub msg_id: String,
    pub operator_id: String,
    pub contract_id: String,
    pub customer_id: String,
    pub site_id: String,
    /// 信号使用的工单标识（AP id / OTT 机顶盒 MAC / 工单 id）
    pub signal_work_id: String,
    pub primary_unit_id: String,
    pub set_top_unit_id: String,
    pub modem_unit_id: String,
    pub etc_1: String,
    pub etc_2: String,
    pub etc_3: String,
    pub etc_4: String,
    pub join_contract_id: String,
    pub wait_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalResponse {
    /// O_IFSVC_RESULT
    pub result: String,
    pub message: String,
}

impl SignalResponse {
    pub fn is_success(&self, success_prefix: &str) -> bool {
        self.result.starts_with(success_prefix)
    }
}
