// ==========================================
// 现场工单系统 - 设备保存校验引擎
// ==========================================
// 职责: 保存设备分配前的四项顺序校验，以及合同状态/取消校验
// 校验顺序（首个失败即中止，不做部分提交）:
// 1. 匹配校验: 每条分配必须带实物编号（线缆除外）
// 2. 客户自有设备字段校验
// 3. 成对设备/赠品设备/重复编号校验
// 4. 附加产品校验
// ==========================================

use crate::config::work_rules::WorkRules;
use crate::domain::equipment::AllocationRecord;
use crate::domain::types::{ContractStatus, ItemCategory, WorkStatus, WorkType};
use crate::domain::work::WorkContext;
use crate::i18n::{t, t_with_args};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// 其他原因取消代码，需填写详情
pub const CANCEL_REASON_OTHER: &str = "099Z";

/// 其他原因取消详情最小长度（字符）
pub const CANCEL_DETAIL_MIN_LEN: usize = 10;

// ==========================================
// OwnershipField - 客户自有设备必填字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipField {
    ItemCode,
    UnitId,
    UnitDirId,
    MacAddress,
    CmMac,
    RtcaId,
    OwnershipType,
}

impl OwnershipField {
    /// 后端字段名
    pub fn backend_name(&self) -> &'static str {
        match self {
            OwnershipField::ItemCode => "ITEM_CD",
            OwnershipField::UnitId => "EQT_NO",
            OwnershipField::UnitDirId => "EQT_UNI_ID",
            OwnershipField::MacAddress => "MAC_ADDRESS",
            OwnershipField::CmMac => "STB_CM_MAC",
            OwnershipField::RtcaId => "STB_RTCA_ID",
            OwnershipField::OwnershipType => "OWNER_TP_CD",
        }
    }
}

impl fmt::Display for OwnershipField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.backend_name())
    }
}

// ==========================================
// ValidationFailure - 校验失败原因
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("设备编号缺失: {model}")]
    MissingUnitId { model: String },

    #[error("客户自有设备字段缺失: unit={unit_id}, field={field}")]
    MissingOwnershipField { unit_id: String, field: OwnershipField },

    #[error("成对设备必须同时选择: {label}")]
    IncompletePair { label: String },

    #[error("产品 {product_code} 必须包含设备分类 {required_class}")]
    BonusEquipmentMissing {
        product_code: String,
        required_class: String,
    },

    #[error("设备编号重复: {unit_id}")]
    DuplicateUnit { unit_id: String },

    #[error("附加产品需要机顶盒: {product_name}")]
    AddOnRequiresSetTop { product_name: String },

    #[error("合同状态不允许当前作业: work_type={work_type}, contract_status={contract_status}")]
    ContractStatusNotAllowed {
        work_type: WorkType,
        contract_status: ContractStatus,
    },

    #[error("取消原因必填")]
    CancelReasonRequired,

    #[error("当前作业状态不可取消: {status}")]
    CancelNotAllowed { status: WorkStatus },

    #[error("其他原因取消需填写至少 {min_len} 个字符的详情")]
    CancelDetailTooShort { min_len: usize },
}

impl ValidationFailure {
    /// 面向技师的本地化提示
    pub fn localized_message(&self) -> String {
        match self {
            ValidationFailure::MissingUnitId { model } => {
                t_with_args("validation.missing_unit_id", &[("model", model)])
            }
            ValidationFailure::MissingOwnershipField { unit_id, field } => t_with_args(
                "validation.missing_ownership_field",
                &[("unit_id", unit_id), ("field", field.backend_name())],
            ),
            ValidationFailure::IncompletePair { label } => {
                t_with_args("validation.incomplete_pair", &[("label", label)])
            }
            ValidationFailure::BonusEquipmentMissing {
                product_code,
                required_class,
            } => t_with_args(
                "validation.bonus_equipment_missing",
                &[("product_code", product_code), ("class", required_class)],
            ),
            ValidationFailure::DuplicateUnit { unit_id } => {
                t_with_args("validation.duplicate_unit", &[("unit_id", unit_id)])
            }
            ValidationFailure::AddOnRequiresSetTop { product_name } => t_with_args(
                "validation.addon_requires_settop",
                &[("product_name", product_name)],
            ),
            ValidationFailure::ContractStatusNotAllowed {
                work_type,
                contract_status,
            } => t_with_args(
                "validation.contract_status_not_allowed",
                &[
                    ("work_type", work_type.as_code()),
                    ("status", &contract_status.to_string()),
                ],
            ),
            ValidationFailure::CancelReasonRequired => t("validation.cancel_reason_required"),
            ValidationFailure::CancelNotAllowed { status } => t_with_args(
                "validation.cancel_not_allowed",
                &[("status", status.as_code())],
            ),
            ValidationFailure::CancelDetailTooShort { min_len } => t_with_args(
                "validation.cancel_detail_too_short",
                &[("min_len", &min_len.to_string())],
            ),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationFailure>;

// ==========================================
// ValidationEngine - 校验引擎
// ==========================================
pub struct ValidationEngine {
    rules: WorkRules,
}

impl ValidationEngine {
    pub fn new(rules: WorkRules) -> Self {
        Self { rules }
    }

    /// 保存前校验
    ///
    /// # 参数
    /// - allocations: 当前分配记录
    /// - ctx: 工单上下文（基础产品、附加产品）
    ///
    /// # 返回
    /// - Ok(()): 全部通过
    /// - Err(ValidationFailure): 第一个失败项
    pub fn validate_save(
        &self,
        allocations: &[AllocationRecord],
        ctx: &WorkContext,
    ) -> ValidationResult<()> {
        let result = self
            .check_match(allocations)
            .and_then(|_| self.check_ownership(allocations))
            .and_then(|_| self.check_pairing(allocations, ctx))
            .and_then(|_| self.check_add_ons(allocations, ctx));

        match &result {
            Ok(()) => debug!(
                work_id = %ctx.work_id,
                allocations = allocations.len(),
                "设备保存校验通过"
            ),
            Err(failure) => warn!(work_id = %ctx.work_id, failure = %failure, "设备保存校验失败"),
        }
        result
    }

    // ==========================================
    // 1. 匹配校验
    // ==========================================
    fn check_match(&self, allocations: &[AllocationRecord]) -> ValidationResult<()> {
        for record in allocations {
            if record.category() == ItemCategory::Cable {
                continue;
            }
            if record.unit.unit_id.trim().is_empty() {
                let model = if record.unit.model_name.trim().is_empty() {
                    record.slot.display_name.clone()
                } else {
                    record.unit.model_name.clone()
                };
                return Err(ValidationFailure::MissingUnitId { model });
            }
        }
        Ok(())
    }

    // ==========================================
    // 2. 客户自有设备字段校验
    // ==========================================
    fn check_ownership(&self, allocations: &[AllocationRecord]) -> ValidationResult<()> {
        for record in allocations.iter().filter(|a| a.unit.is_customer_owned()) {
            let unit = &record.unit;
            let own = &unit.ownership;

            let required: &[OwnershipField] = match unit.category {
                ItemCategory::Modem => &[
                    OwnershipField::ItemCode,
                    OwnershipField::UnitId,
                    OwnershipField::UnitDirId,
                ],
                ItemCategory::WirelessRouter | ItemCategory::IspTerminal => &[
                    OwnershipField::ItemCode,
                    OwnershipField::UnitId,
                    OwnershipField::MacAddress,
                ],
                ItemCategory::SetTop => &[
                    OwnershipField::ItemCode,
                    OwnershipField::UnitId,
                    OwnershipField::MacAddress,
                    OwnershipField::CmMac,
                    OwnershipField::RtcaId,
                ],
                _ => &[],
            };

            for field in required {
                let present = match field {
                    OwnershipField::ItemCode => is_present(own.item_code.as_deref()),
                    OwnershipField::UnitId => is_present(Some(unit.unit_id.as_str())),
                    OwnershipField::UnitDirId => is_present(own.unit_dir_id.as_deref()),
                    OwnershipField::MacAddress => is_present(record.effective_mac()),
                    OwnershipField::CmMac => is_present(own.cm_mac.as_deref()),
                    OwnershipField::RtcaId => is_present(own.rtca_id.as_deref()),
                    OwnershipField::OwnershipType => true,
                };
                if !present {
                    return Err(ValidationFailure::MissingOwnershipField {
                        unit_id: unit.unit_id.clone(),
                        field: *field,
                    });
                }
            }

            // 所有客户自有设备都要求所有权类型，"[]" 视为未填
            let ownership_type = own.ownership_type.as_deref().map(str::trim).unwrap_or("");
            if ownership_type.is_empty() || ownership_type == "[]" {
                return Err(ValidationFailure::MissingOwnershipField {
                    unit_id: unit.unit_id.clone(),
                    field: OwnershipField::OwnershipType,
                });
            }
        }
        Ok(())
    }

    // ==========================================
    // 3. 成对设备 / 赠品设备 / 重复编号
    // ==========================================
    fn check_pairing(&self, allocations: &[AllocationRecord], ctx: &WorkContext) -> ValidationResult<()> {
        let has_class = |class: &str| allocations.iter().any(|a| class_code_of(a) == class);

        for rule in &self.rules.pairing_rules {
            if has_class(&rule.first_class) != has_class(&rule.second_class) {
                return Err(ValidationFailure::IncompletePair {
                    label: rule.label.clone(),
                });
            }
        }

        let base_product = ctx.base_product_code.trim();
        if self
            .rules
            .bonus_product_codes
            .iter()
            .any(|code| code == base_product)
            && !has_class(&self.rules.bonus_required_class)
        {
            return Err(ValidationFailure::BonusEquipmentMissing {
                product_code: base_product.to_string(),
                required_class: self.rules.bonus_required_class.clone(),
            });
        }

        let mut seen = HashSet::new();
        for record in allocations {
            let unit_id = record.unit.unit_id.trim();
            if unit_id.is_empty() {
                continue;
            }
            if !seen.insert(unit_id) {
                return Err(ValidationFailure::DuplicateUnit {
                    unit_id: unit_id.to_string(),
                });
            }
        }
        Ok(())
    }

    // ==========================================
    // 4. 附加产品校验
    // ==========================================
    fn check_add_ons(&self, allocations: &[AllocationRecord], ctx: &WorkContext) -> ValidationResult<()> {
        let has_set_top = allocations
            .iter()
            .any(|a| a.category() == ItemCategory::SetTop);
        if has_set_top {
            return Ok(());
        }

        let marker = self.rules.addon_settop_marker.as_str();
        match ctx.add_ons.iter().find(|p| p.metadata.contains(marker)) {
            Some(product) => Err(ValidationFailure::AddOnRequiresSetTop {
                product_name: product.prod_name.clone(),
            }),
            None => Ok(()),
        }
    }
}

// ==========================================
// 合同状态校验
// ==========================================

/// 合同状态是否允许当前作业类型
pub fn is_contract_status_allowed(work_type: WorkType, status: ContractStatus) -> bool {
    use ContractStatus::*;
    match work_type {
        WorkType::Install => status == InstallScheduled,
        WorkType::Termination => matches!(status, Active | Suspended | SuspendedSpecific),
        WorkType::AfterService => status != Terminated,
        WorkType::TempSuspension => status == Active,
        WorkType::SuspensionRelease => matches!(status, Suspended | SuspendedSpecific),
        WorkType::Relocation
        | WorkType::ProductChange
        | WorkType::RemovalMove
        | WorkType::RemovalTerm => status == Active,
        WorkType::Suspension | WorkType::Other => status != Terminated,
    }
}

/// 合同状态校验（未提供合同状态时不做限制）
pub fn validate_contract_status(ctx: &WorkContext) -> ValidationResult<()> {
    match ctx.contract_status {
        Some(status) if !is_contract_status_allowed(ctx.work_type, status) => {
            Err(ValidationFailure::ContractStatusNotAllowed {
                work_type: ctx.work_type,
                contract_status: status,
            })
        }
        _ => Ok(()),
    }
}

// ==========================================
// 取消校验
// ==========================================

/// 作业取消校验
///
/// # 参数
/// - reason_code: 取消原因代码
/// - detail: 取消详情（原因为 099Z 时必填）
pub fn validate_cancel(
    ctx: &WorkContext,
    reason_code: &str,
    detail: Option<&str>,
) -> ValidationResult<()> {
    let reason_code = reason_code.trim();
    if reason_code.is_empty() {
        return Err(ValidationFailure::CancelReasonRequired);
    }
    if !ctx.work_status.is_editable() {
        return Err(ValidationFailure::CancelNotAllowed {
            status: ctx.work_status,
        });
    }
    if reason_code == CANCEL_REASON_OTHER {
        let detail_len = detail.map(|d| d.trim().chars().count()).unwrap_or(0);
        if detail_len < CANCEL_DETAIL_MIN_LEN {
            return Err(ValidationFailure::CancelDetailTooShort {
                min_len: CANCEL_DETAIL_MIN_LEN,
            });
        }
    }
    Ok(())
}

fn is_present(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// 设备分类代码: 实物优先，缺失时取槽位
pub(crate) fn class_code_of(record: &AllocationRecord) -> &str {
    let unit_class = record.unit.class_code.trim();
    if unit_class.is_empty() {
        record.slot.class_code.trim()
    } else {
        unit_class
    }
}
