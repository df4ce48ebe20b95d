// ==========================================
// 现场工单系统 - 远端协作方接口
// ==========================================
// 职责: 库存服务、开通信号、终端认证后端的异步接口定义
// 说明: Engine 层只依赖 trait，具体 HTTP 实现由宿主提供
// 约定: 列表类接口返回原始 JSON，由 protocol 模块在边界统一归一化
// ==========================================

use crate::domain::equipment::InventorySnapshot;
use crate::domain::protocol::{
    ActivationRequest, ActivationResponse, CertificationQuery, DirectoryLookupRequest,
    DirectoryUnlinkRequest, DuplicateCheckRequest, EquipmentListRequest, LineDetailRequest,
    LineRegistrationRequest, PortListRequest, SignalRequest, SignalResponse, SubscriptionInfo,
    SubscriptionRequest, SubscriptionResponse,
};
use crate::domain::work::WorkContext;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("远端调用失败 [{endpoint}]: {message}")]
    RemoteCallError { endpoint: String, message: String },

    #[error("远端响应格式错误 [{endpoint}]: {message}")]
    MalformedResponse { endpoint: String, message: String },
}

impl GatewayError {
    pub fn remote(endpoint: &str, message: impl Into<String>) -> Self {
        GatewayError::RemoteCallError {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            GatewayError::RemoteCallError { endpoint, .. }
            | GatewayError::MalformedResponse { endpoint, .. } => endpoint,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

// ==========================================
// InventoryService - 技师库存服务
// ==========================================
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// 加载合同设备、技师库存、客户已装设备与已回收设备
    async fn load_inventory(
        &self,
        ctx: &WorkContext,
        operator_id: &str,
    ) -> GatewayResult<InventorySnapshot>;
}

// ==========================================
// SignalGateway - 开通信号
// ==========================================
#[async_trait]
pub trait SignalGateway: Send + Sync {
    async fn send_signal(&self, request: &SignalRequest) -> GatewayResult<SignalResponse>;
}

// ==========================================
// CertifyGateway - 终端认证后端
// ==========================================
#[async_trait]
pub trait CertifyGateway: Send + Sync {
    // ===== 加入 =====

    /// 查询合同已有加入信息
    async fn query_subscription(&self, contract_id: &str) -> GatewayResult<Option<SubscriptionInfo>>;

    async fn register_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> GatewayResult<SubscriptionResponse>;

    async fn cancel_subscription(
        &self,
        request: &SubscriptionRequest,
        subscription_no: &str,
    ) -> GatewayResult<SubscriptionResponse>;

    // ===== 目录关联 =====

    async fn lookup_directory(&self, request: &DirectoryLookupRequest) -> GatewayResult<Value>;

    async fn unlink_directory(&self, request: &DirectoryUnlinkRequest) -> GatewayResult<Value>;

    // ===== 线路查询 =====

    /// 固定端口 / OLT 查询
    async fn query_network_line(&self, contract_id: &str, subscription_no: &str) -> GatewayResult<Value>;

    async fn list_network_nodes(&self, request: &EquipmentListRequest) -> GatewayResult<Value>;

    async fn list_ports(&self, request: &PortListRequest) -> GatewayResult<Value>;

    /// 集线详情（终端 MAC/序列号、IP、速率等）
    async fn query_line_detail(&self, request: &LineDetailRequest) -> GatewayResult<Value>;

    // ===== 线路登记 =====

    async fn check_duplicate(&self, request: &DuplicateCheckRequest) -> GatewayResult<Value>;

    async fn register_line(&self, request: &LineRegistrationRequest) -> GatewayResult<Value>;

    // ===== 开通 / 解除 =====

    async fn activate(&self, request: &ActivationRequest) -> GatewayResult<ActivationResponse>;

    async fn query_certification(&self, query: &CertificationQuery) -> GatewayResult<Value>;

    /// 认证适用营业点清单
    async fn list_eligible_sites(&self) -> GatewayResult<Vec<String>>;

    async fn terminate(&self, query: &CertificationQuery) -> GatewayResult<Value>;
}
