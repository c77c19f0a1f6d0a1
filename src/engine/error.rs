// ==========================================
// DIRBS 数据保留维护 - 引擎层错误类型
// ==========================================
// 错误分类:
// - Configuration: 保留策略非法，在任何破坏性操作之前拒绝
// - InvariantViolation: 分区跨月，任何删除之前整体中止
// - RowConservationViolation: 事后行数守恒校验失败（删除已提交，无法回退）
// - Database: DDL/DML 失败，立即上抛，不自动重试
// ==========================================

use crate::domain::types::InvalidRetentionPolicy;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PruneError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("分区不变量被破坏: 表 {table} 包含多个或非法的 (年, 月) 身份: {identities:?}")]
    InvariantViolation {
        table: String,
        identities: Vec<String>,
    },

    #[error(
        "行数守恒校验失败: 裁剪前 {rows_before} 行 - 裁剪后 {rows_after} 行 != 已裁剪 {rows_pruned} 行"
    )]
    RowConservationViolation {
        rows_before: u64,
        rows_after: u64,
        rows_pruned: u64,
    },

    #[error("分片数不一致: 重建前 {before}，重建后 {after}")]
    ShardCountMismatch { before: u32, after: u32 },

    #[error("数据库错误: {0}")]
    Database(#[from] RepositoryError),
}

impl From<InvalidRetentionPolicy> for PruneError {
    fn from(err: InvalidRetentionPolicy) -> Self {
        PruneError::Configuration(err.to_string())
    }
}

impl From<rusqlite::Error> for PruneError {
    fn from(err: rusqlite::Error) -> Self {
        PruneError::Database(err.into())
    }
}

pub type PruneResult<T> = Result<T, PruneError>;
