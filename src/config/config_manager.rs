// ==========================================
// DIRBS 数据保留维护 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::condition_config::{active_condition_set, parse_conditions, ConditionConfig};
use crate::config::error::{ConfigError, ConfigResult};
use crate::config::retention_config_trait::RetentionConfigReader;
use crate::db::{ensure_maintenance_schema, open_sqlite_connection};
use crate::domain::classification::ActiveConditionSet;
use crate::domain::types::RetentionPolicy;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 未配置时的保留月数
pub const DEFAULT_MONTHS_RETENTION: u32 = 6;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_maintenance_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = lock(&conn)?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            ensure_maintenance_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = lock(&self.conn)?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（存在则覆盖）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::debug!(key, "配置已更新");
        Ok(())
    }

    /// 获取所有配置的快照（JSON 对象，键有序）
    ///
    /// # 用途
    /// - 经 PruneApi::with_config_snapshot 写入运行审计的 config 键
    pub fn get_config_snapshot(&self) -> ConfigResult<serde_json::Value> {
        let conn = lock(&self.conn)?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let config_map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(serde_json::to_value(&config_map)?)
    }
}

fn lock(conn: &Arc<Mutex<Connection>>) -> ConfigResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| ConfigError::Lock(format!("锁获取失败: {}", e)))
}

// ==========================================
// RetentionConfigReader Trait 实现
// ==========================================
#[async_trait]
impl RetentionConfigReader for ConfigManager {
    async fn get_retention_policy(&self) -> ConfigResult<RetentionPolicy> {
        let Some(raw) = self.get_config_value(config_keys::MONTHS_RETENTION)? else {
            return Ok(RetentionPolicy::new(DEFAULT_MONTHS_RETENTION));
        };

        let months = raw.trim().parse::<i64>().map_err(|e| ConfigError::Parse {
            key: config_keys::MONTHS_RETENTION.to_string(),
            message: format!("{:?}: {}", raw, e),
        })?;
        Ok(RetentionPolicy::try_from_months(months)?)
    }

    async fn get_conditions(&self) -> ConfigResult<Vec<ConditionConfig>> {
        match self.get_config_value(config_keys::CONDITIONS)? {
            Some(raw) => parse_conditions(&raw),
            None => Ok(Vec::new()),
        }
    }

    async fn get_active_conditions(&self) -> ConfigResult<ActiveConditionSet> {
        let conditions = self.get_conditions().await?;
        Ok(active_condition_set(&conditions))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 保留策略
    pub const MONTHS_RETENTION: &str = "retention.months_retention";

    // 分类条件 (JSON 数组)
    pub const CONDITIONS: &str = "conditions";
}
