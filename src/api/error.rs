// ==========================================
// DIRBS 数据保留维护 - API层错误类型
// ==========================================
// 职责: 汇总配置、引擎、仓储错误，给出可读的失败原因
// ==========================================

use crate::config::error::ConfigError;
use crate::engine::error::PruneError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
/// 所有错误信息必须包含显式原因
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 配置与输入错误（发生在任何破坏性操作之前）
    // ==========================================
    #[error("配置错误: {0}")]
    ConfigurationError(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 数据不变量错误
    // ==========================================
    #[error("分区不变量被破坏: 表 {table} 包含 {identities:?}")]
    PartitionInvariantViolation {
        table: String,
        identities: Vec<String>,
    },

    #[error("行数守恒校验失败: before={rows_before} after={rows_after} pruned={rows_pruned}")]
    RowConservationViolation {
        rows_before: u64,
        rows_after: u64,
        rows_pruned: u64,
    },

    #[error("分片数不一致: before={before} after={after}")]
    ShardCountMismatch { before: u32, after: u32 },

    #[error("存储布局不一致: {0}")]
    LayoutMismatch(String),

    // ==========================================
    // 权限错误
    // ==========================================
    #[error("权限不足: {0}")]
    PermissionDenied(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::PermissionDenied { role } => {
                ApiError::PermissionDenied(format!("会话未被授予角色 {}", role))
            }
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::InvalidIdentifier(name) => {
                ApiError::InvalidInput(format!("非法标识符: {:?}", name))
            }
            RepositoryError::LayoutMismatch(msg) => ApiError::LayoutMismatch(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 PruneError 转换
// ==========================================
impl From<PruneError> for ApiError {
    fn from(err: PruneError) -> Self {
        match err {
            PruneError::Configuration(msg) => ApiError::ConfigurationError(msg),
            PruneError::InvariantViolation { table, identities } => {
                ApiError::PartitionInvariantViolation { table, identities }
            }
            PruneError::RowConservationViolation {
                rows_before,
                rows_after,
                rows_pruned,
            } => ApiError::RowConservationViolation {
                rows_before,
                rows_after,
                rows_pruned,
            },
            PruneError::ShardCountMismatch { before, after } => {
                ApiError::ShardCountMismatch { before, after }
            }
            PruneError::Database(err) => err.into(),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Database(e) => RepositoryError::from(e).into(),
            other => ApiError::ConfigurationError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_error_mapping() {
        let err: ApiError = PruneError::ShardCountMismatch { before: 4, after: 3 }.into();
        assert!(matches!(err, ApiError::ShardCountMismatch { before: 4, after: 3 }));

        let err: ApiError = PruneError::Database(RepositoryError::PermissionDenied {
            role: "dirbs_core_power_user".to_string(),
        })
        .into();
        assert!(matches!(err, ApiError::PermissionDenied(_)));
    }

    #[test]
    fn test_config_error_mapping() {
        let err: ApiError = ConfigError::Invalid {
            key: "conditions".to_string(),
            message: "x".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::ConfigurationError(_)));
    }
}
