// ==========================================
// 现场工单系统 - 业务规则集
// ==========================================
// 职责: 会话开始时一次性解析的规则清单（配对表、赠品产品、成功码）
// 说明: 各清单均可通过 config_kv 覆写，缺省值取自现行业务目录
// ==========================================

use crate::config::error::ConfigResult;
use crate::config::rule_config_trait::WorkRuleConfigReader;
use serde::{Deserialize, Serialize};

/// 成对设备规则: 两个设备分类必须同时出现或同时缺失
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRule {
    pub label: String,
    pub first_class: String,
    pub second_class: String,
}

impl PairingRule {
    pub fn new(label: &str, first_class: &str, second_class: &str) -> Self {
        Self {
            label: label.to_string(),
            first_class: first_class.to_string(),
            second_class: second_class.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRules {
    /// 需要附带指定设备的赠品产品代码
    pub bonus_product_codes: Vec<String>,
    /// 赠品产品要求的设备分类
    pub bonus_required_class: String,
    pub pairing_rules: Vec<PairingRule>,
    /// 附加产品属性中代表机顶盒的标记
    pub addon_settop_marker: String,
    /// 服务开通成功码
    pub activation_success_codes: Vec<String>,
    /// 开通信号成功前缀
    pub signal_success_prefix: String,
}

impl Default for WorkRules {
    fn default() -> Self {
        Self {
            bonus_product_codes: vec![
                "MAXW001".to_string(),
                "MAXW002".to_string(),
                "MAXW003".to_string(),
            ],
            bonus_required_class: "092101".to_string(),
            pairing_rules: vec![
                PairingRule::new("WIFI/AP", "090805", "091002"),
                PairingRule::new("DECT/HANDY", "090804", "090901"),
            ],
            addon_settop_marker: "0904".to_string(),
            activation_success_codes: vec!["SUCCESS".to_string(), "OK".to_string()],
            signal_success_prefix: "TRUE".to_string(),
        }
    }
}

impl WorkRules {
    /// 从配置读取器解析完整规则集
    pub async fn load(reader: &dyn WorkRuleConfigReader) -> ConfigResult<Self> {
        Ok(Self {
            bonus_product_codes: reader.get_bonus_product_codes().await?,
            bonus_required_class: reader.get_bonus_required_class().await?,
            pairing_rules: reader.get_pairing_rules().await?,
            addon_settop_marker: reader.get_addon_settop_marker().await?,
            activation_success_codes: reader.get_activation_success_codes().await?,
            signal_success_prefix: reader.get_signal_success_prefix().await?,
        })
    }

    pub fn is_activation_success(&self, code: &str) -> bool {
        let code = code.trim();
        self.activation_success_codes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(code))
    }
}
