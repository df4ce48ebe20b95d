// ==========================================
// 现场工单系统 - 业务规则配置读取 Trait
// ==========================================
// 职责: 定义校验/认证所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::error::ConfigResult;
use crate::config::work_rules::PairingRule;
use async_trait::async_trait;

// ==========================================
// WorkRuleConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait WorkRuleConfigReader: Send + Sync {
    /// 获取赠品产品代码清单
    ///
    /// # 默认值
    /// - ["MAXW001", "MAXW002", "MAXW003"]
    async fn get_bonus_product_codes(&self) -> ConfigResult<Vec<String>>;

    /// 获取赠品产品要求的设备分类
    ///
    /// # 默认值
    /// - "092101"
    async fn get_bonus_required_class(&self) -> ConfigResult<String>;

    /// 获取成对设备规则
    ///
    /// # 默认值
    /// - WIFI/AP: 090805 + 091002
    /// - DECT/HANDY: 090804 + 090901
    async fn get_pairing_rules(&self) -> ConfigResult<Vec<PairingRule>>;

    /// 获取附加产品的机顶盒标记
    ///
    /// # 默认值
    /// - "0904"
    async fn get_addon_settop_marker(&self) -> ConfigResult<String>;

    /// 获取服务开通成功码
    ///
    /// # 默认值
    /// - ["SUCCESS", "OK"]
    async fn get_activation_success_codes(&self) -> ConfigResult<Vec<String>>;

    /// 获取开通信号成功前缀
    ///
    /// # 默认值
    /// - "TRUE"
    async fn get_signal_success_prefix(&self) -> ConfigResult<String>;
}
