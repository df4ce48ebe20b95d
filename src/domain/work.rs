// ==========================================
// 现场工单系统 - 工单上下文
// ==========================================
// 职责: 会话内不可变的工单标识与产品属性
// 说明: 替代原先跨组件共享的全局过滤参数对象，
//       由流程状态机持有并按引用传给需要的组件
// ==========================================

use crate::domain::types::{ContractStatus, TransportMode, WorkStatus, WorkType};
use serde::{Deserialize, Serialize};

/// 附加产品
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnProduct {
    pub prod_code: String,
    pub prod_name: String,
    /// 产品属性 (ATTR_VAL_22)，包含设备分类前缀
    #[serde(default)]
    pub metadata: String,
}

// ==========================================
// WorkContext - 工单上下文
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkContext {
    pub work_id: String,
    pub contract_id: String,
    pub customer_id: String,
    /// 营业点 (SO_ID)
    pub site_id: String,
    pub work_type: WorkType,
    pub work_status: WorkStatus,
    pub contract_status: Option<ContractStatus>,
    /// 产品组 (PROD_GRP)
    pub product_group: String,
    /// 基础产品代码 (BASIC_PROD_CD / PROD_CD)
    pub base_product_code: String,
    pub voip_product_code: Option<String>,
    pub isp_product_code: Option<String>,
    /// 结合合同 (CTRT_JOIN_ID)
    pub join_contract_id: Option<String>,
    /// 网络分类 (NET_CL)
    pub network_class: Option<String>,
    /// 迁移/变更前合同 (CONT_ID_OLD)
    pub previous_contract_id: Option<String>,
    /// 是否需要终端认证
    pub certification_required: bool,
    /// 光种代码 (OPLN_KD_CD)
    pub transport_code: String,
    /// 市场代码 (MRKT_CD)
    #[serde(default)]
    pub market_code: String,
    #[serde(default)]
    pub add_ons: Vec<AddOnProduct>,
}

impl WorkContext {
    pub fn transport_mode(&self) -> TransportMode {
        TransportMode::from_op_code(&self.transport_code)
    }

    /// VoIP 单独产品
    pub fn is_voip_only(&self) -> bool {
        has_text(&self.voip_product_code)
    }

    pub fn has_isp_product(&self) -> bool {
        has_text(&self.isp_product_code)
    }

    pub fn has_join_contract(&self) -> bool {
        has_text(&self.join_contract_id)
    }

    /// 流程步骤数: 认证产品 6 步，其余 5 步
    pub fn total_steps(&self) -> usize {
        if self.certification_required {
            6
        } else {
            5
        }
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}
