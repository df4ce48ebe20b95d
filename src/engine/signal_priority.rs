// ==========================================
// 现场工单系统 - 开通信号设备优先级
// ==========================================
// 职责: 从当前分配中选出参与开通信号的主设备与辅助参数
// 优先级:
// - VoIP 单独产品: 仅 VoIP 网关(08)
// - 其余: 光终端(05) > 路由器(01) > 调制解调器(03) >
//         无线路由器(02, 仅产品组 I) > VoIP 网关(08) > 机顶盒(04)
// ==========================================

use crate::domain::equipment::AllocationRecord;
use crate::domain::protocol::SignalRequest;
use crate::domain::types::ItemCategory;
use crate::domain::work::WorkContext;
use crate::engine::validation::class_code_of;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// 信号等待时间（秒）
pub const SIGNAL_WAIT_TIME: &str = "3";

const MSG_ID_VOIP: &str = "SMR60";
const MSG_ID_DEFAULT: &str = "SMR03";

/// 接入点设备分类
const CLASS_ACCESS_POINT: &str = "091003";
/// OTT 机顶盒设备分类
const CLASS_OTT_SET_TOP: &str = "092201";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalResolveError {
    #[error("尚未分配任何设备, 无法发送开通信号")]
    NoEquipment,

    #[error("VoIP 产品缺少结合合同 (CTRT_JOIN_ID)")]
    MissingVoipJoinContract,

    #[error("ISP 产品缺少结合合同 (CTRT_JOIN_ID)")]
    MissingIspJoinContract,

    #[error("缺少机顶盒或调制解调器, 无法发送开通信号")]
    NoSignalEquipment,
}

pub type SignalResult<T> = Result<T, SignalResolveError>;

/// 产品组相关的辅助参数 ETC_1..ETC_4
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxParams {
    pub etc_1: String,
    pub etc_2: String,
    pub etc_3: String,
    pub etc_4: String,
}

/// 开通信号计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPlan {
    pub msg_id: String,
    pub primary_unit_id: Option<String>,
    pub primary_category: Option<ItemCategory>,
    pub set_top_unit_id: Option<String>,
    pub modem_unit_id: Option<String>,
    pub aux: AuxParams,
    pub signal_work_id: String,
}

// ==========================================
// SignalPriorityResolver
// ==========================================
#[derive(Debug, Default)]
pub struct SignalPriorityResolver;

impl SignalPriorityResolver {
    pub fn new() -> Self {
        Self
    }

    /// 主设备扫描顺序
    pub fn priority_order(ctx: &WorkContext) -> Vec<ItemCategory> {
        if ctx.is_voip_only() {
            return vec![ItemCategory::VoipGateway];
        }
        let mut order = vec![
            ItemCategory::FiberTerminal,
            ItemCategory::Router,
            ItemCategory::Modem,
        ];
        if ctx.product_group == "I" {
            order.push(ItemCategory::WirelessRouter);
        }
        order.push(ItemCategory::VoipGateway);
        order.push(ItemCategory::SetTop);
        order
    }

    /// 按优先级选出主设备
    pub fn primary_unit<'a>(
        &self,
        allocations: &'a [AllocationRecord],
        ctx: &WorkContext,
    ) -> Option<&'a AllocationRecord> {
        Self::priority_order(ctx)
            .into_iter()
            .find_map(|category| first_of(allocations, category))
    }

    /// 产品组相关辅助参数
    pub fn aux_params(&self, allocations: &[AllocationRecord], ctx: &WorkContext) -> AuxParams {
        let unit_of = |category| unit_id_of(allocations, category);
        let group = ctx.product_group.as_str();
        let mut aux = AuxParams::default();

        if ctx.is_voip_only() {
            aux.etc_1 = unit_of(ItemCategory::WirelessRouter);
        } else {
            aux.etc_1 = unit_of(ItemCategory::SetTop);
            if aux.etc_1.is_empty() && group == "A" {
                aux.etc_1 = ctx.network_class.clone().unwrap_or_default();
            }
        }

        aux.etc_2 = unit_of(ItemCategory::Special);

        if group == "C" {
            aux.etc_3 = unit_of(ItemCategory::WirelessRouter);
        }

        if group == "V" {
            aux.etc_4 = unit_of(ItemCategory::VoipExtension);
        }
        if ctx.has_isp_product() {
            aux.etc_4 = unit_of(ItemCategory::IspTerminal);
        }

        aux
    }

    pub fn msg_id(ctx: &WorkContext) -> &'static str {
        if ctx.product_group == "V" {
            MSG_ID_VOIP
        } else {
            MSG_ID_DEFAULT
        }
    }

    /// 解析开通信号计划
    ///
    /// # 返回
    /// - Err(NoEquipment): 无任何分配
    /// - Err(Missing*JoinContract): 需要结合合同但缺失
    /// - Err(NoSignalEquipment): 既无机顶盒也无调制解调器，且优先级扫描无结果
    pub fn resolve(&self, allocations: &[AllocationRecord], ctx: &WorkContext) -> SignalResult<SignalPlan> {
        if allocations.is_empty() {
            return Err(SignalResolveError::NoEquipment);
        }

        let group = ctx.product_group.as_str();
        if group == "V" && !ctx.is_voip_only() && !ctx.has_join_contract() {
            return Err(SignalResolveError::MissingVoipJoinContract);
        }
        if group == "I" && ctx.has_isp_product() && !ctx.has_join_contract() {
            return Err(SignalResolveError::MissingIspJoinContract);
        }

        let primary = self.primary_unit(allocations, ctx);
        let set_top = allocations.iter().find(|a| is_set_top(a));
        let modem = allocations.iter().find(|a| is_modem(a));

        if primary.is_none() && set_top.is_none() && modem.is_none() {
            return Err(SignalResolveError::NoSignalEquipment);
        }

        let plan = SignalPlan {
            msg_id: Self::msg_id(ctx).to_string(),
            primary_unit_id: primary.map(|a| a.unit.unit_id.clone()),
            primary_category: primary.map(|a| a.category()),
            set_top_unit_id: set_top.map(|a| a.unit.unit_id.clone()),
            modem_unit_id: modem.map(|a| a.unit.unit_id.clone()),
            aux: self.aux_params(allocations, ctx),
            signal_work_id: signal_work_id(allocations, ctx),
        };

        debug!(
            work_id = %ctx.work_id,
            msg_id = %plan.msg_id,
            primary = ?plan.primary_unit_id,
            "开通信号计划已解析"
        );
        Ok(plan)
    }

    /// 组装开通信号请求
    pub fn build_request(&self, plan: &SignalPlan, ctx: &WorkContext, operator_id: &str) -> SignalRequest {
        let primary = plan.primary_unit_id.clone().unwrap_or_default();
        let join_contract_id = if ctx.product_group == "V" || ctx.has_isp_product() {
            ctx.join_contract_id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| ctx.contract_id.clone())
        } else {
            String::new()
        };

        let request = SignalRequest {
            msg_id: plan.msg_id.clone(),
            operator_id: operator_id.to_string(),
            contract_id: ctx.contract_id.clone(),
            customer_id: ctx.customer_id.clone(),
            site_id: ctx.site_id.clone(),
            signal_work_id: plan.signal_work_id.clone(),
            set_top_unit_id: plan.set_top_unit_id.clone().unwrap_or_else(|| primary.clone()),
            modem_unit_id: plan.modem_unit_id.clone().unwrap_or_default(),
            primary_unit_id: primary,
            etc_1: plan.aux.etc_1.clone(),
            etc_2: plan.aux.etc_2.clone(),
            etc_3: plan.aux.etc_3.clone(),
            etc_4: plan.aux.etc_4.clone(),
            join_contract_id,
            wait_time: SIGNAL_WAIT_TIME.to_string(),
        };

        info!(
            work_id = %ctx.work_id,
            msg_id = %request.msg_id,
            primary = %request.primary_unit_id,
            "开通信号请求已组装"
        );
        request
    }
}

fn first_of(allocations: &[AllocationRecord], category: ItemCategory) -> Option<&AllocationRecord> {
    allocations.iter().find(|a| a.category() == category)
}

fn unit_id_of(allocations: &[AllocationRecord], category: ItemCategory) -> String {
    first_of(allocations, category)
        .map(|a| a.unit.unit_id.clone())
        .unwrap_or_default()
}

fn is_set_top(record: &AllocationRecord) -> bool {
    record.category() == ItemCategory::SetTop || class_code_of(record).starts_with("0904")
}

fn is_modem(record: &AllocationRecord) -> bool {
    record.category() == ItemCategory::Modem || class_code_of(record).starts_with("0902")
}

/// 信号作业 id: AP 设备编号 > OTT 机顶盒 MAC > 工单 id
fn signal_work_id(allocations: &[AllocationRecord], ctx: &WorkContext) -> String {
    if let Some(ap) = allocations
        .iter()
        .find(|a| class_code_of(a) == CLASS_ACCESS_POINT)
    {
        return ap.unit.unit_id.clone();
    }
    if let Some(ott) = allocations
        .iter()
        .find(|a| class_code_of(a) == CLASS_OTT_SET_TOP)
    {
        if let Some(mac) = ott.effective_mac() {
            return mac.to_string();
        }
    }
    ctx.work_id.clone()
}

#[cfg(test)]
mod tests;
