// ==========================================
// 现场工单系统 - 终端认证会话模型
// ==========================================
// 职责: 加入号、目录关联结果、线路描述、认证状态
// 红线: 线路描述仅在设备指纹一致时有效
// ==========================================

use crate::domain::types::{CertificationState, CertifyType, TransportMode};
use serde::{Deserialize, Serialize};

/// 加入信息 (ENTR_NO / ENTR_RQST_NO)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_no: String,
    pub request_no: String,
}

/// 目录绑定对象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingKind {
    AccessPoint,
    Terminal,
}

/// 目录中登记的一条设备绑定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryBinding {
    pub kind: BindingKind,
    pub unit_id: String,
    pub mac_address: Option<String>,
}

// ==========================================
// DirectoryLink - 目录关联结果
// ==========================================
// NotAttempted 与 Empty 必须区分: 后者表示已查询但无数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "bindings", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectoryLink {
    NotAttempted,
    Empty,
    Linked(Vec<DirectoryBinding>),
}

impl DirectoryLink {
    pub fn is_linked(&self) -> bool {
        matches!(self, DirectoryLink::Linked(_))
    }

    /// 已完成查询（含无数据）
    pub fn is_attempted(&self) -> bool {
        !matches!(self, DirectoryLink::NotAttempted)
    }

    pub fn bindings(&self) -> &[DirectoryBinding] {
        match self {
            DirectoryLink::Linked(bindings) => bindings,
            _ => &[],
        }
    }
}

impl Default for DirectoryLink {
    fn default() -> Self {
        DirectoryLink::NotAttempted
    }
}

/// 网络节点（FTTH 为 RN，光宽带为 L2）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub node_id: String,
    pub node_name: String,
    pub model_name: Option<String>,
    pub site_name: Option<String>,
}

/// 端口信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub port_no: String,
    pub in_use: bool,
    /// 占用该端口的加入号
    pub subscriber_no: Option<String>,
}

/// 集线详情合并得到的终端信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_type: Option<String>, // T
    pub ont_mac: Option<String>,
    pub ont_serial: Option<String>,
    pub ap_mac: Option<String>,
    pub device_id: Option<String>,
    pub ip: Option<String>,
    pub port: Option<String>,
    pub max_speed: Option<String>,
    pub status: Option<String>, // ST
}

// ==========================================
// LineDescriptor - 线路描述
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDescriptor {
    pub transport: TransportMode,
    /// 设备 id (EQIP_ID): L2 或 RN
    pub equipment_id: String,
    /// 端口 (EQIP_PORT_NO)
    pub port: Option<String>,
    pub model_name: Option<String>,
    pub site_name: Option<String>,
    pub olt_id: Option<String>,
    pub olt_port: Option<String>,
    pub port_in_use: bool,
    pub port_subscriber_no: Option<String>,
    #[serde(default)]
    pub node_candidates: Vec<NetworkNode>,
    #[serde(default)]
    pub port_grid: Vec<PortInfo>,
    #[serde(default)]
    pub device: DeviceInfo,
    /// 生成时的设备指纹
    pub fingerprint: String,
}

impl LineDescriptor {
    pub fn has_port(&self) -> bool {
        self.port.as_deref().map(|p| !p.trim().is_empty()).unwrap_or(false)
    }

    pub fn is_fresh(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint
    }
}

// ==========================================
// CertificationSession - 认证会话
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationSession {
    pub state: CertificationState,
    pub subscription: Option<Subscription>,
    #[serde(default)]
    pub directory_link: DirectoryLink,
    pub line_descriptor: Option<LineDescriptor>,
    pub certify_type: Option<CertifyType>,
}

impl Default for CertificationSession {
    fn default() -> Self {
        Self {
            state: CertificationState::Unsubscribed,
            subscription: None,
            directory_link: DirectoryLink::NotAttempted,
            line_descriptor: None,
            certify_type: None,
        }
    }
}

impl CertificationSession {
    pub fn subscription_no(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.subscription_no.as_str())
    }

    /// 与当前指纹一致的线路描述
    pub fn fresh_descriptor(&self, fingerprint: &str) -> Option<&LineDescriptor> {
        self.line_descriptor.as_ref().filter(|d| d.is_fresh(fingerprint))
    }

    /// 指纹不一致时静默丢弃线路描述
    ///
    /// # 返回
    /// - true: 发生了丢弃
    pub fn invalidate_stale_descriptor(&mut self, fingerprint: &str) -> bool {
        let stale = self
            .line_descriptor
            .as_ref()
            .map(|d| !d.is_fresh(fingerprint))
            .unwrap_or(false);
        if stale {
            self.line_descriptor = None;
        }
        stale
    }
}
