// ==========================================
// DIRBS 数据保留维护 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 标识符经 Identifier 转义，值全部参数化，防止 SQL 注入
// ==========================================

pub mod classification_state_repo;
pub mod error;
pub mod job_metadata_repo;
pub mod partition_catalog_repo;

// 重导出核心仓储
pub use classification_state_repo::{
    physical_shards, ClassificationStateRepository, PhysicalShard, CLASSIFICATION_STATE_TABLE,
};
pub use error::{RepositoryError, RepositoryResult};
pub use job_metadata_repo::JobMetadataRepository;
pub use partition_catalog_repo::PartitionCatalogRepository;
