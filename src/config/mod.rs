// ==========================================
// 现场工单系统 - 配置层
// ==========================================
// 职责: 业务规则清单的配置化与缺省值
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod error;
pub mod rule_config_trait;
pub mod work_rules;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use error::{ConfigError, ConfigResult};
pub use rule_config_trait::WorkRuleConfigReader;
pub use work_rules::{PairingRule, WorkRules};
