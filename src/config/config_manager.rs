// ==========================================
// 现场工单系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id + key → value)
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::rule_config_trait::WorkRuleConfigReader;
use crate::config::work_rules::{PairingRule, WorkRules};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const BONUS_PRODUCT_CODES: &str = "equipment/bonus_product_codes";
    pub const BONUS_REQUIRED_CLASS: &str = "equipment/bonus_required_class";
    pub const PAIRING_RULES: &str = "equipment/pairing_rules";
    pub const ADDON_SETTOP_MARKER: &str = "equipment/addon_settop_marker";
    pub const ACTIVATION_SUCCESS_CODES: &str = "certify/activation_success_codes";
    pub const SIGNAL_SUCCESS_PREFIX: &str = "signal/success_prefix";
}

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    defaults: WorkRules,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等），并确保 config_kv 表存在。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ConfigError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
            guard.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS config_kv (
                  scope_id TEXT NOT NULL,
                  key TEXT NOT NULL,
                  value TEXT NOT NULL,
                  updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                  PRIMARY KEY (scope_id, key)
                );
                "#,
            )?;
        }

        Ok(Self {
            conn,
            defaults: WorkRules::default(),
        })
    }

    fn get_conn(&self) -> ConfigResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        tracing::debug!(key = key, "配置已写入");
        Ok(())
    }

    /// 读取 JSON 配置，缺失时取默认值
    fn get_json_or_default<T: DeserializeOwned>(&self, key: &str, default: T) -> ConfigResult<T> {
        match self.get_config_value(key)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    /// 读取文本配置，缺失或空白时取默认值
    fn get_text_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 日志与排障时记录当前生效的规则覆写
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(json!(config_map).to_string())
    }
}

// ==========================================
// WorkRuleConfigReader 实现
// ==========================================
#[async_trait]
impl WorkRuleConfigReader for ConfigManager {
    async fn get_bonus_product_codes(&self) -> ConfigResult<Vec<String>> {
        self.get_json_or_default(
            config_keys::BONUS_PRODUCT_CODES,
            self.defaults.bonus_product_codes.clone(),
        )
    }

    async fn get_bonus_required_class(&self) -> ConfigResult<String> {
        self.get_text_or_default(
            config_keys::BONUS_REQUIRED_CLASS,
            &self.defaults.bonus_required_class,
        )
    }

    async fn get_pairing_rules(&self) -> ConfigResult<Vec<PairingRule>> {
        self.get_json_or_default(config_keys::PAIRING_RULES, self.defaults.pairing_rules.clone())
    }

    async fn get_addon_settop_marker(&self) -> ConfigResult<String> {
        self.get_text_or_default(
            config_keys::ADDON_SETTOP_MARKER,
            &self.defaults.addon_settop_marker,
        )
    }

    async fn get_activation_success_codes(&self) -> ConfigResult<Vec<String>> {
        self.get_json_or_default(
            config_keys::ACTIVATION_SUCCESS_CODES,
            self.defaults.activation_success_codes.clone(),
        )
    }

    async fn get_signal_success_prefix(&self) -> ConfigResult<String> {
        self.get_text_or_default(
            config_keys::SIGNAL_SUCCESS_PREFIX,
            &self.defaults.signal_success_prefix,
        )
    }
}
