// ==========================================
// DIRBS 数据保留维护 - 配置层错误类型
// ==========================================

use crate::domain::types::InvalidRetentionPolicy;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置库访问失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置连接锁获取失败: {0}")]
    Lock(String),

    #[error("配置项 {key} 无法解析: {message}")]
    Parse { key: String, message: String },

    #[error("配置项 {key} 非法: {message}")]
    Invalid { key: String, message: String },

    #[error(transparent)]
    RetentionPolicy(#[from] InvalidRetentionPolicy),

    #[error("配置序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
