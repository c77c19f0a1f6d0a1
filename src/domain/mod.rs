// ==========================================
// DIRBS 数据保留维护 - 领域模型层
// ==========================================
// 职责: 定义保留策略、分区身份、分类状态等领域类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod classification;
pub mod job_metadata;
pub mod partition;
pub mod triplet;
pub mod types;

// 重导出核心类型
pub use classification::{
    virt_imei_shard_bounds, virt_imei_shard_for, ActiveConditionSet, ClassificationRecord,
    ShardBounds, ShardCount, NUM_VIRTUAL_IMEI_SHARDS,
};
pub use job_metadata::{JobMetadata, JobStatus};
pub use partition::{
    LeafPartition, PartitionIdentity, PartitionedTable, YearMonth,
    MONTHLY_NETWORK_TRIPLETS_COUNTRY, MONTHLY_NETWORK_TRIPLETS_PER_MNO,
};
pub use triplet::TripletObservation;
pub use types::{InvalidRetentionPolicy, RetentionPolicy};
