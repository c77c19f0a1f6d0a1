// ==========================================
// DIRBS 数据保留维护 - API 层
// ==========================================
// 职责: 提供裁剪任务接口,供命令行入口调用
// ==========================================

pub mod error;
pub mod prune_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use prune_api::{
    ClassificationPruneReport, ClassificationPruneRequest, PruneApi, TripletPruneReport,
    TripletPruneRequest, COMMAND, SUBCOMMAND_CLASSIFICATION_STATE, SUBCOMMAND_TRIPLETS,
};
