// ==========================================
// 现场工单系统 - 终端认证编排器
// ==========================================
// 职责: 驱动认证产品的加入、目录关联、线路查询/登记、开通与解除
// 状态机: Unsubscribed → Subscribed → DirectoryLinked(仅宽带) → LineRegistered
//         → Activated | Terminated
// 红线:
// - 子步骤失败不回滚已完成的步骤
// - 线路描述指纹与当前分配不一致时必须丢弃并重新查询
// - 不做自动重试
// ==========================================

use crate::config::work_rules::WorkRules;
use crate::domain::certification::{
    CertificationSession, DeviceInfo, DirectoryLink, LineDescriptor, NetworkNode,
    PortInfo, Subscription,
};
use crate::domain::equipment::AllocationRecord;
use crate::domain::protocol::{
    directory_bindings, field, normalize_records, ActivationRequest, ActivationResponse,
    CertificationQuery, CertificationStatus, DirectoryLookupRequest, DirectoryUnitRef,
    DirectoryUnlinkRequest, DuplicateCheckRequest, DuplicateCheckResult, EquipmentListRequest,
    LineDetailRequest, LineRegistrationRequest, NetworkLineInfo, NormalizedRecord,
    PortListRequest, RemoteResult, SubscriptionRequest, SubscriptionResponse,
};
use crate::domain::types::{
    ActivationReason, CertificationState, CertifyType, ItemCategory, TransportMode, WorkType,
};
use crate::domain::work::WorkContext;
use crate::engine::allocation::AllocationStore;
use crate::engine::gateways::{CertifyGateway, GatewayError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 线路登记客户分类
const CUSTOMER_DIVISION: &str = "HS";
/// A/S 作业的加入请求号占位
const NULL_REQUEST_NO: &str = "null";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertifyError {
    #[error("认证状态不允许该操作: state={state}, operation={operation}")]
    InvalidState {
        state: CertificationState,
        operation: &'static str,
    },

    #[error("接入方式不支持认证流程: {0}")]
    UnsupportedTransport(TransportMode),

    #[error("缺少认证必需设备: {0}")]
    MissingEquipment(&'static str),

    #[error("线路信息缺失, 请先查询线路信息")]
    MissingDescriptor,

    #[error("线路信息未选择端口")]
    MissingPort,

    #[error("设备已变更, 线路信息已失效, 请重新查询")]
    StaleDescriptor,

    #[error("端口不存在: {0}")]
    UnknownPort(String),

    #[error("端口已被其他加入者使用: port={port}, subscriber={subscriber}")]
    PortInUse { port: String, subscriber: String },

    #[error("存在重复加入者, 请更换端口")]
    DuplicateSubscriber,

    #[error("远端拒绝 [{operation}] code={code}: {message}")]
    Rejected {
        operation: &'static str,
        code: String,
        message: String,
    },

    #[error(transparent)]
    Remote(#[from] GatewayError),
}

pub type CertifyResult<T> = Result<T, CertifyError>;

/// 加入结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscribeOutcome {
    /// 已有加入号，需要技师确认后重新加入（未做任何修改）
    ConfirmationRequired { existing_subscription_no: String },
    Subscribed { resubscribed: bool },
}

/// 线路查询方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineQuery {
    /// 固定端口（光宽带）
    FixedPort,
    /// 光纤: OLT → 节点列表 → 指定节点端口
    Fiber { node_id: Option<String> },
}

/// 认证解除结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationOutcome {
    pub certified: bool,
    pub terminated: bool,
    pub error: Option<String>,
}

// ==========================================
// CertificationOrchestrator
// ==========================================
pub struct CertificationOrchestrator {
    gateway: Arc<dyn CertifyGateway>,
    rules: WorkRules,
}

impl CertificationOrchestrator {
    pub fn new(gateway: Arc<dyn CertifyGateway>, rules: WorkRules) -> Self {
        Self { gateway, rules }
    }

    // ==========================================
    // 加入
    // ==========================================

    /// 加入登记
    ///
    /// # 参数
    /// - confirm_resubscribe: 已有加入号时是否确认重新加入（取消后重新登记）
    ///
    /// # 返回
    /// - ConfirmationRequired: 已有加入号且未确认，会话不变
    /// - Subscribed: 会话进入 Subscribed，旧目录绑定尽力解除
    pub async fn subscribe(
        &self,
        session: &mut CertificationSession,
        ctx: &WorkContext,
        operator_id: &str,
        confirm_resubscribe: bool,
    ) -> CertifyResult<SubscribeOutcome> {
        ensure_not_finished(session, "subscribe")?;

        let request = SubscriptionRequest {
            work_id: ctx.work_id.clone(),
            contract_id: ctx.contract_id.clone(),
            market_code: ctx.market_code.clone(),
            operator_id: operator_id.to_string(),
        };

        let existing = self.gateway.query_subscription(&ctx.contract_id).await?;
        let resubscribed = match existing {
            Some(info) if !confirm_resubscribe => {
                info!(
                    work_id = %ctx.work_id,
                    subscription_no = %info.subscription_no,
                    "已有加入号, 等待确认重新加入"
                );
                return Ok(SubscribeOutcome::ConfirmationRequired {
                    existing_subscription_no: info.subscription_no,
                });
            }
            Some(info) => {
                let cancelled = self
                    .gateway
                    .cancel_subscription(&request, &info.subscription_no)
                    .await?;
                ensure_subscription_ok(&cancelled, "cancel_subscription")?;
                true
            }
            None => false,
        };

        let response = self.gateway.register_subscription(&request).await?;
        ensure_subscription_ok(&response, "register_subscription")?;
        let subscription_no = response.subscription_no.clone().ok_or_else(|| {
            GatewayError::MalformedResponse {
                endpoint: "register_subscription".to_string(),
                message: "ENTR_NO 缺失".to_string(),
            }
        })?;

        self.unlink_prior_bindings(session, ctx, &subscription_no, operator_id)
            .await;

        session.subscription = Some(Subscription {
            subscription_no,
            request_no: response.request_no.clone().unwrap_or_default(),
        });
        session.directory_link = DirectoryLink::NotAttempted;
        session.line_descriptor = None;
        session.state = CertificationState::Subscribed;

        info!(
            work_id = %ctx.work_id,
            resubscribed = resubscribed,
            subscription_no = ?session.subscription_no(),
            "加入登记完成"
        );
        Ok(SubscribeOutcome::Subscribed { resubscribed })
    }

    /// 尽力解除旧目录绑定，失败仅记录日志
    async fn unlink_prior_bindings(
        &self,
        session: &CertificationSession,
        ctx: &WorkContext,
        subscription_no: &str,
        operator_id: &str,
    ) {
        for binding in session.directory_link.bindings() {
            let request = DirectoryUnlinkRequest {
                contract_id: ctx.contract_id.clone(),
                subscription_no: subscription_no.to_string(),
                operator_id: operator_id.to_string(),
                binding: binding.clone(),
            };
            match self.gateway.unlink_directory(&request).await {
                Ok(value) => {
                    let result = remote_result(&normalize_records(&value));
                    if !result.success {
                        warn!(
                            work_id = %ctx.work_id,
                            unit_id = %binding.unit_id,
                            code = %result.result_code,
                            "旧目录绑定解除失败: {}",
                            result.message
                        );
                    }
                }
                Err(e) => warn!(
                    work_id = %ctx.work_id,
                    unit_id = %binding.unit_id,
                    "旧目录绑定解除失败: {}",
                    e
                ),
            }
        }
    }

    // ==========================================
    // 目录关联
    // ==========================================

    /// 目录关联: 光纤需要终端与 AP，光宽带只需 AP
    pub async fn link_directory<'s>(
        &self,
        session: &'s mut CertificationSession,
        ctx: &WorkContext,
        store: &AllocationStore,
        operator_id: &str,
    ) -> CertifyResult<&'s DirectoryLink> {
        ensure_subscribed(session, "link_directory")?;

        let allocations = store.allocations();
        let access_point = access_point_unit(allocations);
        let terminal = terminal_unit(allocations);

        match ctx.transport_mode() {
            TransportMode::Fiber => {
                if terminal.is_none() {
                    return Err(CertifyError::MissingEquipment("terminal"));
                }
                if access_point.is_none() {
                    return Err(CertifyError::MissingEquipment("access_point"));
                }
            }
            TransportMode::WideBand => {
                if access_point.is_none() {
                    return Err(CertifyError::MissingEquipment("access_point"));
                }
            }
            TransportMode::None => {
                return Err(CertifyError::UnsupportedTransport(TransportMode::None));
            }
        }

        let request = DirectoryLookupRequest {
            work_id: ctx.work_id.clone(),
            contract_id: ctx.contract_id.clone(),
            customer_id: ctx.customer_id.clone(),
            site_id: ctx.site_id.clone(),
            operator_id: operator_id.to_string(),
            terminal: terminal.map(unit_ref),
            access_point: access_point.map(unit_ref),
        };

        let value = self.gateway.lookup_directory(&request).await?;
        let bindings = directory_bindings(&normalize_records(&value));

        session.directory_link = if bindings.is_empty() {
            DirectoryLink::Empty
        } else {
            DirectoryLink::Linked(bindings)
        };
        // 光纤只记录关联结果，状态停留在 Subscribed
        if session.state == CertificationState::Subscribed
            && ctx.transport_mode() == TransportMode::WideBand
        {
            session.state = CertificationState::DirectoryLinked;
        }

        info!(
            work_id = %ctx.work_id,
            linked = session.directory_link.is_linked(),
            bindings = session.directory_link.bindings().len(),
            "目录关联完成"
        );
        Ok(&session.directory_link)
    }

    // ==========================================
    // 线路查询
    // ==========================================

    /// 查询线路信息并生成带指纹的线路描述
    pub async fn query_line_info<'s>(
        &self,
        session: &'s mut CertificationSession,
        ctx: &WorkContext,
        store: &AllocationStore,
        query: LineQuery,
        operator_id: &str,
    ) -> CertifyResult<&'s LineDescriptor> {
        ensure_subscribed(session, "query_line_info")?;
        let subscription = session
            .subscription
            .clone()
            .ok_or(CertifyError::InvalidState {
                state: session.state,
                operation: "query_line_info",
            })?;
        let fingerprint = store.fingerprint();

        let transport = ctx.transport_mode();
        let line = self
            .fetch_network_line(ctx, &subscription.subscription_no)
            .await?;

        let mut descriptor = match (transport, query) {
            (TransportMode::WideBand, LineQuery::FixedPort) => {
                let equipment_id = line.equipment_id.clone().ok_or_else(|| {
                    GatewayError::MalformedResponse {
                        endpoint: "query_network_line".to_string(),
                        message: "EQIP_ID 缺失".to_string(),
                    }
                })?;
                LineDescriptor {
                    transport,
                    equipment_id,
                    port: line.port_name.clone(),
                    model_name: line.model_name.clone(),
                    site_name: line.site_name.clone(),
                    olt_id: None,
                    olt_port: None,
                    port_in_use: false,
                    port_subscriber_no: None,
                    node_candidates: Vec::new(),
                    port_grid: Vec::new(),
                    device: DeviceInfo::default(),
                    fingerprint: fingerprint.clone(),
                }
            }
            (TransportMode::Fiber, LineQuery::Fiber { node_id }) => {
                self.fetch_fiber_descriptor(ctx, &subscription, &line, node_id, &fingerprint)
                    .await?
            }
            (TransportMode::None, _) => {
                return Err(CertifyError::UnsupportedTransport(TransportMode::None));
            }
            (transport, _) => return Err(CertifyError::UnsupportedTransport(transport)),
        };

        descriptor.device = self
            .fetch_device_info(ctx, store.allocations(), operator_id)
            .await;

        debug!(
            work_id = %ctx.work_id,
            transport = %descriptor.transport,
            equipment_id = %descriptor.equipment_id,
            port = ?descriptor.port,
            fingerprint = %descriptor.fingerprint,
            "线路信息查询完成"
        );
        Ok(session.line_descriptor.insert(descriptor))
    }

    async fn fetch_network_line(
        &self,
        ctx: &WorkContext,
        subscription_no: &str,
    ) -> CertifyResult<NetworkLineInfo> {
        let value = self
            .gateway
            .query_network_line(&ctx.contract_id, subscription_no)
            .await?;
        let records = normalize_records(&value);
        let line = records
            .first()
            .map(NetworkLineInfo::from_record)
            .unwrap_or_default();
        if !line.is_success() {
            return Err(CertifyError::Rejected {
                operation: "query_network_line",
                code: line.result_code,
                message: line.message,
            });
        }
        Ok(line)
    }

    async fn fetch_fiber_descriptor(
        &self,
        ctx: &WorkContext,
        subscription: &Subscription,
        line: &NetworkLineInfo,
        node_id: Option<String>,
        fingerprint: &str,
    ) -> CertifyResult<LineDescriptor> {
        let transport = TransportMode::Fiber;
        let request_no = if ctx.work_type == WorkType::AfterService {
            NULL_REQUEST_NO.to_string()
        } else {
            subscription.request_no.clone()
        };

        let node_request = EquipmentListRequest {
            command: transport
                .equipment_list_command()
                .unwrap_or_default()
                .to_string(),
            subscription_no: subscription.subscription_no.clone(),
            request_no,
            biz_type: ctx.work_type.line_biz_type().to_string(),
            contract_id: ctx.contract_id.clone(),
        };
        let nodes: Vec<NetworkNode> = normalize_records(
            &self.gateway.list_network_nodes(&node_request).await?,
        )
        .iter()
        .filter_map(NetworkNode::from_record)
        .collect();

        let selected = match node_id {
            Some(id) => nodes
                .iter()
                .find(|n| n.node_id == id)
                .cloned()
                .ok_or_else(|| CertifyError::Rejected {
                    operation: "list_network_nodes",
                    code: String::new(),
                    message: format!("节点不存在: {}", id),
                })?,
            None => nodes.first().cloned().ok_or_else(|| CertifyError::Rejected {
                operation: "list_network_nodes",
                code: String::new(),
                message: "无可用节点".to_string(),
            })?,
        };

        let port_request = PortListRequest {
            command: transport.port_list_command().unwrap_or_default().to_string(),
            subscription_no: subscription.subscription_no.clone(),
            equipment_id: selected.node_id.clone(),
            contract_id: ctx.contract_id.clone(),
        };
        let ports: Vec<PortInfo> =
            normalize_records(&self.gateway.list_ports(&port_request).await?)
                .iter()
                .filter_map(PortInfo::from_record)
                .collect();

        Ok(LineDescriptor {
            transport,
            equipment_id: selected.node_id.clone(),
            port: None,
            model_name: selected.model_name.clone().or_else(|| line.model_name.clone()),
            site_name: selected.site_name.clone().or_else(|| line.site_name.clone()),
            olt_id: line.olt_id.clone(),
            olt_port: line.olt_port.clone(),
            port_in_use: false,
            port_subscriber_no: None,
            node_candidates: nodes,
            port_grid: ports,
            device: DeviceInfo::default(),
            fingerprint: fingerprint.to_string(),
        })
    }

    /// 集线详情查询（尽力而为），终端 MAC/序列号统一大写
    async fn fetch_device_info(
        &self,
        ctx: &WorkContext,
        allocations: &[AllocationRecord],
        operator_id: &str,
    ) -> DeviceInfo {
        let terminal = terminal_unit(allocations);
        let access_point = access_point_unit(allocations);
        let ont_mac = terminal.and_then(|t| t.effective_mac()).map(str::to_uppercase);
        let ont_serial = terminal
            .map(|t| t.unit.serial_no.trim().to_uppercase())
            .filter(|s| !s.is_empty());
        let ap_mac = access_point.and_then(|a| a.effective_mac()).map(str::to_string);

        let request = LineDetailRequest {
            contract_id: ctx.contract_id.clone(),
            customer_id: ctx.customer_id.clone(),
            site_id: ctx.site_id.clone(),
            work_id: ctx.work_id.clone(),
            operator_id: operator_id.to_string(),
            ont_mac: ont_mac.clone(),
            ont_serial: ont_serial.clone(),
            ap_mac: ap_mac.clone(),
        };

        let mut device = match self.gateway.query_line_detail(&request).await {
            Ok(value) => {
                let records = normalize_records(&value);
                match records.first() {
                    Some(record) if field(record, "ERROR").is_none() => DeviceInfo::from_record(record),
                    Some(record) => {
                        warn!(
                            work_id = %ctx.work_id,
                            "集线详情查询失败: {}",
                            field(record, "ERROR").unwrap_or_default()
                        );
                        DeviceInfo::default()
                    }
                    None => DeviceInfo::default(),
                }
            }
            Err(e) => {
                warn!(work_id = %ctx.work_id, "集线详情查询失败: {}", e);
                DeviceInfo::default()
            }
        };

        if device.ont_mac.is_none() {
            device.ont_mac = ont_mac;
        }
        if device.ont_serial.is_none() {
            device.ont_serial = ont_serial;
        }
        device.ap_mac = ap_mac.or(device.ap_mac);
        device
    }

    /// 光纤: 从端口表中选择端口
    pub fn select_port(
        &self,
        session: &mut CertificationSession,
        store: &AllocationStore,
        port_no: &str,
    ) -> CertifyResult<()> {
        let descriptor = fresh_descriptor_mut(session, &store.fingerprint())?;
        if descriptor.transport != TransportMode::Fiber {
            return Err(CertifyError::UnsupportedTransport(descriptor.transport));
        }
        let port = descriptor
            .port_grid
            .iter()
            .find(|p| p.port_no == port_no)
            .cloned()
            .ok_or_else(|| CertifyError::UnknownPort(port_no.to_string()))?;

        descriptor.port = Some(port.port_no);
        descriptor.port_in_use = port.in_use;
        descriptor.port_subscriber_no = port.subscriber_no;
        Ok(())
    }

    // ==========================================
    // 线路登记
    // ==========================================

    /// 线路登记
    ///
    /// 光纤端口被其他加入者占用时拒绝且不修改会话；
    /// 光宽带先做重复加入者检查，重复时清除线路描述
    pub async fn register_line(
        &self,
        session: &mut CertificationSession,
        ctx: &WorkContext,
        store: &AllocationStore,
        operator_id: &str,
    ) -> CertifyResult<()> {
        ensure_subscribed(session, "register_line")?;
        let subscription = session
            .subscription
            .clone()
            .ok_or(CertifyError::InvalidState {
                state: session.state,
                operation: "register_line",
            })?;

        let descriptor = fresh_descriptor_mut(session, &store.fingerprint())?.clone();
        let port = descriptor
            .port
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or(CertifyError::MissingPort)?;

        match descriptor.transport {
            TransportMode::Fiber => {
                if descriptor.port_in_use {
                    let occupant = descriptor.port_subscriber_no.clone().unwrap_or_default();
                    if occupant != subscription.subscription_no {
                        return Err(CertifyError::PortInUse {
                            port,
                            subscriber: occupant,
                        });
                    }
                }
            }
            TransportMode::WideBand => {
                let request = DuplicateCheckRequest {
                    subscription_no: subscription.subscription_no.clone(),
                    equipment_id: descriptor.equipment_id.clone(),
                    port_name: DuplicateCheckRequest::port_name_for(&port),
                    contract_id: ctx.contract_id.clone(),
                };
                let records = normalize_records(&self.gateway.check_duplicate(&request).await?);
                let result = records
                    .first()
                    .map(DuplicateCheckResult::from_record)
                    .unwrap_or(DuplicateCheckResult {
                        success: false,
                        subscriber_exists: false,
                        message: "空响应".to_string(),
                    });
                if !result.success {
                    return Err(CertifyError::Rejected {
                        operation: "check_duplicate",
                        code: String::new(),
                        message: result.message,
                    });
                }
                if result.subscriber_exists {
                    session.line_descriptor = None;
                    warn!(work_id = %ctx.work_id, port = %port, "存在重复加入者, 线路信息已清除");
                    return Err(CertifyError::DuplicateSubscriber);
                }
            }
            TransportMode::None => {
                return Err(CertifyError::UnsupportedTransport(TransportMode::None));
            }
        }

        let request = build_line_registration(ctx, &subscription, &descriptor, &port, operator_id);
        let records = normalize_records(&self.gateway.register_line(&request).await?);
        let result = remote_result(&records);
        if !result.success {
            return Err(CertifyError::Rejected {
                operation: "register_line",
                code: result.result_code,
                message: result.message,
            });
        }

        session.state = CertificationState::LineRegistered;
        info!(
            work_id = %ctx.work_id,
            equipment_id = %descriptor.equipment_id,
            port = %port,
            "线路登记完成"
        );
        Ok(())
    }

    // ==========================================
    // 认证类型
    // ==========================================

    /// 判定迁移/变更作业的认证类型
    ///
    /// 原合同已认证 × 营业点在认证清单:
    /// (是, 是) → Update; (否, 是) → Create; (是, 否) → Delete; 其余 → 无
    pub async fn determine_certify_type(
        &self,
        session: &mut CertificationSession,
        ctx: &WorkContext,
        operator_id: &str,
    ) -> CertifyResult<Option<CertifyType>> {
        let contract_id = ctx
            .previous_contract_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| ctx.contract_id.clone());

        let certified = match self
            .query_certification_status(ctx, &contract_id, operator_id)
            .await
        {
            Ok(status) => status.is_certified_for(&contract_id),
            Err(e) => {
                warn!(work_id = %ctx.work_id, "原合同认证状态查询失败: {}", e);
                false
            }
        };

        let site_eligible = match self.gateway.list_eligible_sites().await {
            Ok(sites) => sites.iter().any(|s| s.trim() == ctx.site_id),
            Err(e) => {
                warn!(work_id = %ctx.work_id, "认证营业点清单查询失败: {}", e);
                false
            }
        };

        let certify_type = match (certified, site_eligible) {
            (true, true) => Some(CertifyType::Update),
            (false, true) => Some(CertifyType::Create),
            (true, false) => Some(CertifyType::Delete),
            (false, false) => None,
        };
        session.certify_type = certify_type;

        info!(
            work_id = %ctx.work_id,
            certified = certified,
            site_eligible = site_eligible,
            certify_type = ?certify_type,
            "认证类型判定完成"
        );
        Ok(certify_type)
    }

    // ==========================================
    // 开通 / 解除
    // ==========================================

    /// 服务开通
    pub async fn activate_service(
        &self,
        session: &mut CertificationSession,
        ctx: &WorkContext,
        store: &AllocationStore,
        operator_id: &str,
    ) -> CertifyResult<ActivationResponse> {
        if session.state != CertificationState::LineRegistered
            || session.certify_type == Some(CertifyType::Delete)
        {
            return Err(CertifyError::InvalidState {
                state: session.state,
                operation: "activate_service",
            });
        }

        let descriptor = fresh_descriptor_mut(session, &store.fingerprint())?.clone();
        let port = descriptor.port.clone().ok_or(CertifyError::MissingPort)?;

        let certify_type = session.certify_type;
        let reason = match certify_type {
            Some(CertifyType::Create) => ActivationReason::New,
            Some(CertifyType::Update) => ActivationReason::Change,
            _ => ActivationReason::for_work_type(ctx.work_type),
        };
        let previous_contract_id = if certify_type == Some(CertifyType::Update) {
            ctx.previous_contract_id.clone()
        } else {
            None
        };

        let request = ActivationRequest {
            contract_id: ctx.contract_id.clone(),
            customer_id: ctx.customer_id.clone(),
            work_id: ctx.work_id.clone(),
            site_id: ctx.site_id.clone(),
            operator_id: operator_id.to_string(),
            certify_type: certify_type.map(|t| t.as_code().to_string()),
            equipment_id: descriptor.equipment_id.clone(),
            equipment_port: port,
            equipment_model: descriptor.model_name.clone(),
            equipment_division: descriptor.transport.equipment_division().to_string(),
            site_name: descriptor.site_name.clone(),
            device: descriptor.device.clone(),
            reason: reason.as_code().to_string(),
            previous_contract_id,
        };

        let response = self.gateway.activate(&request).await?;
        if !self.rules.is_activation_success(&response.code) {
            warn!(
                work_id = %ctx.work_id,
                code = %response.code,
                "服务开通失败: {}",
                response.message
            );
            return Err(CertifyError::Rejected {
                operation: "activate_service",
                code: response.code,
                message: response.message,
            });
        }

        session.state = CertificationState::Activated;
        info!(work_id = %ctx.work_id, code = %response.code, "服务开通完成");
        Ok(response)
    }

    /// 服务解除: 先查询认证状态，已认证才发起解除
    ///
    /// 仅在已认证且解除成功时进入 Terminated
    pub async fn terminate_service(
        &self,
        session: &mut CertificationSession,
        ctx: &WorkContext,
        operator_id: &str,
    ) -> CertifyResult<TerminationOutcome> {
        let status = self
            .query_certification_status(ctx, &ctx.contract_id, operator_id)
            .await?;
        if !status.is_certified_for(&ctx.contract_id) {
            info!(work_id = %ctx.work_id, "合同未认证, 无需解除");
            return Ok(TerminationOutcome {
                certified: false,
                terminated: false,
                error: None,
            });
        }

        let query = certification_query(ctx, &ctx.contract_id, operator_id);
        let error = match self.gateway.terminate(&query).await {
            Ok(value) => normalize_records(&value)
                .first()
                .and_then(|r| field(r, "ERROR")),
            Err(e) => Some(e.to_string()),
        };

        let terminated = error.is_none();
        if terminated {
            session.state = CertificationState::Terminated;
            info!(work_id = %ctx.work_id, "服务解除完成");
        } else {
            warn!(work_id = %ctx.work_id, error = ?error, "服务解除失败");
        }

        Ok(TerminationOutcome {
            certified: true,
            terminated,
            error,
        })
    }

    async fn query_certification_status(
        &self,
        ctx: &WorkContext,
        contract_id: &str,
        operator_id: &str,
    ) -> CertifyResult<CertificationStatus> {
        let query = certification_query(ctx, contract_id, operator_id);
        let value = self.gateway.query_certification(&query).await?;
        Ok(normalize_records(&value)
            .first()
            .map(CertificationStatus::from_record)
            .unwrap_or_default())
    }
}

// ==========================================
// 辅助函数
// ==========================================

fn ensure_not_finished(session: &CertificationSession, operation: &'static str) -> CertifyResult<()> {
    if matches!(
        session.state,
        CertificationState::Activated | CertificationState::Terminated
    ) {
        return Err(CertifyError::InvalidState {
            state: session.state,
            operation,
        });
    }
    Ok(())
}

fn ensure_subscribed(session: &CertificationSession, operation: &'static str) -> CertifyResult<()> {
    ensure_not_finished(session, operation)?;
    if session.state == CertificationState::Unsubscribed || session.subscription.is_none() {
        return Err(CertifyError::InvalidState {
            state: session.state,
            operation,
        });
    }
    Ok(())
}

fn ensure_subscription_ok(response: &SubscriptionResponse, operation: &'static str) -> CertifyResult<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(CertifyError::Rejected {
        operation,
        code: response.result_code.clone(),
        message: response.message.clone(),
    })
}

/// 取与当前指纹一致的线路描述；过期则丢弃并报错
fn fresh_descriptor_mut<'a>(
    session: &'a mut CertificationSession,
    fingerprint: &str,
) -> CertifyResult<&'a mut LineDescriptor> {
    if session.invalidate_stale_descriptor(fingerprint) {
        debug!(fingerprint = %fingerprint, "线路信息指纹不一致, 已丢弃");
        return Err(CertifyError::StaleDescriptor);
    }
    session
        .line_descriptor
        .as_mut()
        .ok_or(CertifyError::MissingDescriptor)
}

fn remote_result(records: &[NormalizedRecord]) -> RemoteResult {
    match records.first() {
        Some(record) => RemoteResult::from_result_code(
            &field(record, "RESULT_CD").unwrap_or_default(),
            &field(record, "RESULT_MSG").unwrap_or_default(),
        ),
        None => RemoteResult::from_result_code("N", "空响应"),
    }
}

fn certification_query(ctx: &WorkContext, contract_id: &str, operator_id: &str) -> CertificationQuery {
    CertificationQuery {
        contract_id: contract_id.to_string(),
        customer_id: ctx.customer_id.clone(),
        site_id: ctx.site_id.clone(),
        operator_id: operator_id.to_string(),
        work_id: ctx.work_id.clone(),
    }
}

fn build_line_registration(
    ctx: &WorkContext,
    subscription: &Subscription,
    descriptor: &LineDescriptor,
    port: &str,
    operator_id: &str,
) -> LineRegistrationRequest {
    let fiber = descriptor.transport == TransportMode::Fiber;
    LineRegistrationRequest {
        op_code: ctx.transport_code.trim().to_uppercase(),
        subscription_no: subscription.subscription_no.clone(),
        request_no: subscription.request_no.clone(),
        biz_type: ctx.work_type.line_biz_type().to_string(),
        olt_id: if fiber {
            descriptor.olt_id.clone().unwrap_or_default()
        } else {
            String::new()
        },
        olt_port: if fiber {
            descriptor.olt_port.clone().unwrap_or_default()
        } else {
            String::new()
        },
        equipment_id: descriptor.equipment_id.clone(),
        equipment_port: port.to_string(),
        system_division: ctx.market_code.clone(),
        process_kind: String::new(),
        customer_division: CUSTOMER_DIVISION.to_string(),
        equipment_division: descriptor.transport.equipment_division().to_string(),
        device_division: descriptor
            .device
            .device_type
            .clone()
            .unwrap_or_else(|| "X".to_string()),
        user_id: operator_id.to_string(),
        delete_flag: "N".to_string(),
        contract_id: ctx.contract_id.clone(),
    }
}

/// 认证终端: 光终端优先，其次无线路由器
fn terminal_unit(allocations: &[AllocationRecord]) -> Option<&AllocationRecord> {
    allocations
        .iter()
        .find(|a| a.category() == ItemCategory::FiberTerminal)
        .or_else(|| {
            allocations
                .iter()
                .find(|a| a.category() == ItemCategory::WirelessRouter)
        })
}

fn access_point_unit(allocations: &[AllocationRecord]) -> Option<&AllocationRecord> {
    allocations
        .iter()
        .find(|a| a.category() == ItemCategory::VoipExtension)
}

fn unit_ref(record: &AllocationRecord) -> DirectoryUnitRef {
    DirectoryUnitRef {
        unit_id: record.unit.unit_id.clone(),
        mac_address: record.effective_mac().map(str::to_string),
    }
}
