// ==========================================
// DIRBS 数据保留维护 - 配置层
// ==========================================
// 职责: 读取保留策略与条件配置
// 存储: config_kv 表（scope_id = 'global'）
// ==========================================

pub mod condition_config;
pub mod config_manager;
pub mod error;
pub mod retention_config_trait;

// 重导出核心配置管理器
pub use condition_config::{active_condition_set, parse_conditions, ConditionConfig};
pub use config_manager::{config_keys, ConfigManager, DEFAULT_MONTHS_RETENTION};
pub use error::{ConfigError, ConfigResult};
pub use retention_config_trait::RetentionConfigReader;
